//! HTTP/1.1 client engine for embedded systems.
//!
//! The engine formats requests into caller-owned buffers, sends them over a
//! transport session opened through [`crate::network::Connect`], and parses
//! responses back into caller-owned buffers. It never allocates: every byte it
//! touches belongs to a buffer the application handed in.
//!
//! # Layers
//!
//! - [`Client`]: the engine instance, created with [`Client::init`].
//! - [`Connection`]: one session to one server, opened implicitly by the first
//!   send or explicitly with [`Connection::connect`].
//! - [`Request`] and [`Response`]: formatting and parsing over borrowed
//!   buffers.
//! - [`Connection::send_sync`] blocks until the response is in.
//!   [`Connection::send_async`] queues the exchange and reports progress
//!   through a [`ResponseHandler`].
//! - [`download`] fetches large objects with range requests and [`url`]
//!   splits pre-signed URLs.
//!
//! # Usage
//!
//! ```rust,no_run
//! use libiot_https::network::application::http::{
//!     Client, ClientConfig, ConnectionConfig, RequestInfo, Response,
//! };
//! # use libiot_https::network::{Connect, Endpoint};
//! # use libiot_https::network::error::Error as NetError;
//! # struct Socket;
//! # impl libiot_https::network::Read for Socket {
//! #     type Error = NetError;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, NetError> { Ok(0) }
//! # }
//! # impl libiot_https::network::Write for Socket {
//! #     type Error = NetError;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, NetError> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), NetError> { Ok(()) }
//! # }
//! # impl libiot_https::network::Close for Socket {
//! #     type Error = NetError;
//! #     fn close(self) -> Result<(), NetError> { Ok(()) }
//! # }
//! # impl libiot_https::network::Connection for Socket {
//! #     fn now_ms(&self) -> u64 { 0 }
//! # }
//! # struct Stack;
//! # impl Connect for Stack {
//! #     type Connection = Socket;
//! #     type Error = NetError;
//! #     fn connect(&mut self, _endpoint: &Endpoint<'_>) -> Result<Socket, NetError> { Ok(Socket) }
//! # }
//! # fn main() -> Result<(), libiot_https::network::application::http::Error> {
//! let client = Client::init(ClientConfig::default());
//!
//! let mut conn_buf = [0u8; 512];
//! let mut req_buf = [0u8; 256];
//! let mut head_buf = [0u8; 512];
//! let mut body_buf = [0u8; 1024];
//!
//! let mut conn = client.connection(
//!     Stack,
//!     ConnectionConfig::new("iot.example.com", 443),
//!     &mut conn_buf,
//! )?;
//! let mut request =
//!     client.initialize_request(&mut req_buf, &RequestInfo::get("/config", "iot.example.com"))?;
//! request.add_header("Accept", "application/json")?;
//! let mut response = Response::new(&mut head_buf, Some(&mut body_buf))?;
//!
//! conn.send_sync(&request, &mut response, 5_000)?;
//! let _status = response.status()?;
//! conn.disconnect()?;
//! # Ok(())
//! # }
//! ```

mod asynchronous;
mod buffer;
mod client;
mod connection;
mod error;
mod exchange;
mod header;
mod request;
mod response;
mod sync;

/// Range-based object download.
pub mod download;
/// URL splitting helpers.
pub mod url;

pub use asynchronous::{
    AsyncState, BodyWriter, Completion, JobId, Rejected, RequestContext, ResponseHandler,
    ResponseReader,
};
pub use buffer::HeaderBuffer;
pub use client::{Client, ClientConfig};
pub use connection::{
    ASYNC_QUEUE_DEPTH, CONNECTION_BUFFER_MIN_SIZE, Connection, ConnectionConfig, Credentials,
    DEFAULT_RESPONSE_WAIT_MS, State, Statistics,
};
pub use error::{Category, Error};
pub use header::{ContentRange, RESERVED_HEADERS, is_reserved};
pub use request::{DEFAULT_USER_AGENT, Method, REQUEST_BUFFER_MIN_SIZE, Request, RequestInfo};
pub use response::{RESPONSE_BUFFER_MIN_SIZE, Response};
