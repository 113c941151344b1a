//! # libiot-https - HTTP/1.1 client engine for IoT devices
//!
//! A small HTTPS client for firmware that talks to cloud endpoints and object
//! storage: telemetry posts, configuration fetches and firmware downloads from
//! pre-signed URLs. It runs in `no_std` environments and never allocates.
//!
//! ## Features
//!
//! - Requests formatted in caller-owned buffers, with reserved headers
//!   (`Host`, `User-Agent`, `Connection`, `Content-Length`) managed by the engine
//! - Responses parsed in caller-owned buffers; headers that do not fit are
//!   dropped without failing the exchange
//! - Persistent connections, reopened implicitly after a failure
//! - Blocking exchanges and queued callback-driven exchanges with cancellation
//! - Range-based download of large objects with a running CRC-32
//! - Any transport: implement [`network::Connect`] for your TCP/TLS stack
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiot-https = "0.1.0"
//! ```
//!
//! ### Blocking GET
//!
//! ```rust,no_run
//! use libiot_https::network::application::http::{
//!     Client, ClientConfig, ConnectionConfig, RequestInfo, Response,
//! };
//! # use libiot_https::network::error::Error as NetError;
//! # struct Modem;
//! # impl libiot_https::network::Read for Modem {
//! #     type Error = NetError;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, NetError> { Ok(0) }
//! # }
//! # impl libiot_https::network::Write for Modem {
//! #     type Error = NetError;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, NetError> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), NetError> { Ok(()) }
//! # }
//! # impl libiot_https::network::Close for Modem {
//! #     type Error = NetError;
//! #     fn close(self) -> Result<(), NetError> { Ok(()) }
//! # }
//! # impl libiot_https::network::Connection for Modem {
//! #     fn now_ms(&self) -> u64 { 0 }
//! # }
//! # struct Stack;
//! # impl libiot_https::network::Connect for Stack {
//! #     type Connection = Modem;
//! #     type Error = NetError;
//! #     fn connect(&mut self, _e: &libiot_https::network::Endpoint<'_>) -> Result<Modem, NetError> { Ok(Modem) }
//! # }
//! # fn main() -> Result<(), libiot_https::network::application::http::Error> {
//! let client = Client::init(ClientConfig::default());
//! let mut conn_buf = [0u8; 256];
//! let mut req_buf = [0u8; 256];
//! let mut head_buf = [0u8; 256];
//! let mut body_buf = [0u8; 512];
//!
//! let mut conn = client.connect(Stack, ConnectionConfig::new("api.example.com", 443), &mut conn_buf)?;
//! let request = client.initialize_request(&mut req_buf, &RequestInfo::get("/v1/ping", "api.example.com"))?;
//! let mut response = Response::new(&mut head_buf, Some(&mut body_buf))?;
//! conn.send_sync(&request, &mut response, 10_000)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt logging of connection and exchange events

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Transport abstraction and the protocol engines built on it.
///
/// The HTTP engine lives in [`network::application::http`].
pub mod network;
