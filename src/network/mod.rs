//! A transport abstraction layer for embedded systems
//!
//! The HTTP engine never opens sockets itself. It consumes a transport
//! capability expressed by the traits in this module: a [`Connect`]or that
//! opens a session to an [`Endpoint`], and a [`Connection`] that can
//! [`Read`], [`Write`] and [`Close`]. Implement them over smoltcp, an AT-command
//! modem, embedded-tls or `std::net` and the engine runs on top unchanged.
//!

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for transport operations
pub mod error;

/// Application layer protocols built on the transport traits
pub mod application;

pub use error::ErrorKind;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, ErrorKind, Read, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: ErrorKind;
    /// Read data from the connection. `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: ErrorKind;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: ErrorKind;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {
    /// Bound every following receive by `timeout_ms` milliseconds, `0` meaning
    /// wait indefinitely. Transports without timeouts may ignore this.
    fn set_timeout(&mut self, _timeout_ms: u32) {}
    /// Milliseconds from a monotonic clock. Exchange deadlines are measured
    /// against it, so it must never go backwards.
    fn now_ms(&self) -> u64;
}

/// TLS material for one session. All certificates are borrowed PEM or DER blobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsConfig<'a> {
    /// Trusted server root certificate.
    pub ca_cert: Option<&'a [u8]>,
    /// Client certificate for mutual authentication.
    pub client_cert: Option<&'a [u8]>,
    /// Client private key for mutual authentication.
    pub private_key: Option<&'a [u8]>,
    /// Comma separated ALPN protocol list.
    pub alpn: Option<&'a str>,
    /// Send the address as the Server Name Indication.
    pub sni: bool,
}

/// Where a session should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    /// DNS name or literal IP address.
    pub address: &'a str,
    /// Remote port.
    pub port: u16,
    /// `None` for plaintext TCP.
    pub tls: Option<TlsConfig<'a>>,
}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: ErrorKind;
    /// Open a session to the endpoint, performing the TLS handshake when requested
    fn connect(&mut self, endpoint: &Endpoint<'_>) -> Result<Self::Connection, Self::Error>;
}
