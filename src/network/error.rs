//! Common error types for transport operations

/// A common error type for transport operations.
///
/// This enum defines a set of common errors that can occur when working with
/// a TCP/TLS session. It is designed to be simple and portable for `no_std`
/// environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// The TLS handshake or record layer failed.
    TlsError,
    /// A protocol-specific error occurred.
    ProtocolError,
}

/// Classifies a transport-specific error into the common [`Error`] kinds.
///
/// Every error type returned by the transport traits implements this so the
/// HTTP engine can tell a timeout or a TLS failure from a plain network drop.
pub trait ErrorKind: core::fmt::Debug {
    /// The common kind of this error.
    fn kind(&self) -> Error;
}

impl ErrorKind for Error {
    fn kind(&self) -> Error {
        *self
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::NotOpen => "connection not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "timed out",
            Error::ConnectionClosed => "connection closed",
            Error::InvalidAddress => "invalid address",
            Error::TlsError => "tls failure",
            Error::ProtocolError => "protocol error",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::TlsError => defmt::write!(f, "TlsError"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
