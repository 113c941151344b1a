//! Error types for the HTTP engine

use crate::network::error::Error as TransportError;

/// Everything that can go wrong while building, sending or reading an HTTP exchange.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A parameter was empty, contained CR/LF, named a reserved header or
    /// did not match the request mode.
    InvalidParameter,
    /// The payload handed to the engine is unusable.
    InvalidPayload,
    /// The response body did not fit in the body buffer. The buffer holds
    /// the first bytes received.
    MessageTooLarge,
    /// A caller buffer is below its documented minimum or cannot hold the
    /// formatted line.
    InsufficientMemory,
    /// The asynchronous queue of the connection is full.
    QueueFull,
    /// The requested header or status is not present in the stored bytes.
    NotFound,
    /// The request body was already written in this callback.
    MessageFinished,
    /// An invariant of the engine was broken.
    InternalError,
    /// The transport failed while sending or receiving. The connection is
    /// now disconnected.
    NetworkError,
    /// The transport could not open a session.
    ConnectionError,
    /// The TLS layer failed.
    TlsError,
    /// The transport timed out waiting for the server.
    TimeoutError,
    /// The response violates HTTP/1.1 framing.
    ParsingError,
    /// The request was cancelled before it completed.
    SendAborted,
    /// The response was cancelled before it completed.
    ReceiveAborted,
    /// The asynchronous job could not be started.
    AsyncSchedulingError,
    /// The connection has an exchange in flight or queued.
    Busy,
    /// The operation is outside what this engine implements.
    NotSupported,
}

/// The coarse class of an [`Error`], describing what state it leaves behind.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Category {
    /// Rejected before any I/O, no side effects.
    Input,
    /// A buffer was too small; partial data stays intact.
    Capacity,
    /// The transport failed; the connection is disconnected.
    Transport,
    /// The server's bytes are not usable HTTP.
    Protocol,
    /// Scheduling or engine failure.
    Internal,
    /// Stopped on request of the caller.
    Cancelled,
}

impl Error {
    /// Classifies the error.
    pub fn category(&self) -> Category {
        match self {
            Error::InvalidParameter
            | Error::InvalidPayload
            | Error::NotFound
            | Error::MessageFinished
            | Error::Busy
            | Error::NotSupported => Category::Input,
            Error::MessageTooLarge | Error::InsufficientMemory | Error::QueueFull => {
                Category::Capacity
            }
            Error::NetworkError
            | Error::ConnectionError
            | Error::TlsError
            | Error::TimeoutError => Category::Transport,
            Error::ParsingError => Category::Protocol,
            Error::InternalError | Error::AsyncSchedulingError => Category::Internal,
            Error::SendAborted | Error::ReceiveAborted => Category::Cancelled,
        }
    }

    /// Whether reconnecting and resending the identical request once is the
    /// expected recovery.
    pub fn is_retryable(&self) -> bool {
        self.category() == Category::Transport
    }

    /// Maps a transport failure that happened on an open session.
    pub(crate) fn from_transport(kind: TransportError) -> Self {
        match kind {
            TransportError::Timeout => Error::TimeoutError,
            TransportError::TlsError => Error::TlsError,
            _ => Error::NetworkError,
        }
    }

    /// Maps a transport failure that happened while opening a session.
    pub(crate) fn from_connect(kind: TransportError) -> Self {
        match kind {
            TransportError::TlsError => Error::TlsError,
            TransportError::Timeout => Error::TimeoutError,
            _ => Error::ConnectionError,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::InvalidParameter => "invalid parameter",
            Error::InvalidPayload => "invalid payload",
            Error::MessageTooLarge => "response body exceeds the body buffer",
            Error::InsufficientMemory => "buffer too small",
            Error::QueueFull => "asynchronous queue full",
            Error::NotFound => "not found",
            Error::MessageFinished => "request body already written",
            Error::InternalError => "internal error",
            Error::NetworkError => "network error",
            Error::ConnectionError => "connection failed",
            Error::TlsError => "tls error",
            Error::TimeoutError => "timed out",
            Error::ParsingError => "malformed response",
            Error::SendAborted => "request cancelled",
            Error::ReceiveAborted => "response cancelled",
            Error::AsyncSchedulingError => "asynchronous scheduling failed",
            Error::Busy => "connection busy",
            Error::NotSupported => "not supported",
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
            Error::InvalidParameter => defmt::write!(f, "InvalidParameter"),
            Error::InvalidPayload => defmt::write!(f, "InvalidPayload"),
            Error::MessageTooLarge => defmt::write!(f, "MessageTooLarge"),
            Error::InsufficientMemory => defmt::write!(f, "InsufficientMemory"),
            Error::QueueFull => defmt::write!(f, "QueueFull"),
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::MessageFinished => defmt::write!(f, "MessageFinished"),
            Error::InternalError => defmt::write!(f, "InternalError"),
            Error::NetworkError => defmt::write!(f, "NetworkError"),
            Error::ConnectionError => defmt::write!(f, "ConnectionError"),
            Error::TlsError => defmt::write!(f, "TlsError"),
            Error::TimeoutError => defmt::write!(f, "TimeoutError"),
            Error::ParsingError => defmt::write!(f, "ParsingError"),
            Error::SendAborted => defmt::write!(f, "SendAborted"),
            Error::ReceiveAborted => defmt::write!(f, "ReceiveAborted"),
            Error::AsyncSchedulingError => defmt::write!(f, "AsyncSchedulingError"),
            Error::Busy => defmt::write!(f, "Busy"),
            Error::NotSupported => defmt::write!(f, "NotSupported"),
        }
    }
}
