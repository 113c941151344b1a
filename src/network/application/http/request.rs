//! Request builder over a caller-owned buffer.

use core::fmt::Write as _;

use heapless::String;

use super::buffer::HeaderBuffer;
use super::error::Error;
use super::header::{CRLF, check_value};

/// Smallest request buffer accepted by [`Request::initialize`].
pub const REQUEST_BUFFER_MIN_SIZE: usize = 64;

/// `User-Agent` sent when the client configuration does not override it.
pub const DEFAULT_USER_AGENT: &str = concat!("libiot-https/", env!("CARGO_PKG_VERSION"));

/// Longest trailer the engine appends at send time.
const TRAILER_CAPACITY: usize = 72;

/// HTTP request methods supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`, the response never carries a body.
    Head,
    /// `PUT`
    Put,
    /// `POST`
    Post,
}

impl Method {
    /// The method token as sent on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Method {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// Everything needed to format a request.
///
/// # Examples
///
/// ```rust
/// use libiot_https::network::application::http::{Method, RequestInfo};
///
/// let info = RequestInfo {
///     method: Method::Post,
///     body: Some(b"{\"temp\":21.5}"),
///     ..RequestInfo::get("/telemetry", "iot.example.com")
/// };
/// assert!(info.persistent);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestInfo<'a> {
    /// Request method.
    pub method: Method,
    /// Path plus query, e.g. `/firmware.bin?X-Amz-Signature=...`.
    pub path: &'a str,
    /// Value of the `Host` header.
    pub host: &'a str,
    /// `Connection: keep-alive` when `true`, `Connection: close` otherwise.
    pub persistent: bool,
    /// The request will be sent with `send_async`.
    pub is_async: bool,
    /// Body of a synchronous request. Asynchronous requests supply their body
    /// from the write-body callback instead.
    pub body: Option<&'a [u8]>,
}

impl<'a> RequestInfo<'a> {
    /// A persistent synchronous `GET`.
    pub fn get(path: &'a str, host: &'a str) -> Self {
        Self {
            method: Method::Get,
            path,
            host,
            persistent: true,
            is_async: false,
            body: None,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.path.is_empty() || self.host.is_empty() {
            return Err(Error::InvalidParameter);
        }
        if self.path.bytes().any(|b| b == b' ') {
            return Err(Error::InvalidParameter);
        }
        check_value(self.path)?;
        check_value(self.host)?;
        if self.is_async && self.body.is_some() {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// A formatted request: request line, `User-Agent` and `Host`, then any
/// headers added by the caller.
///
/// `Connection`, `Content-Length` and the terminating blank line are not
/// stored; the engine emits them when the request is sent, so the same request
/// can be sent again unchanged.
#[derive(Debug)]
pub struct Request<'a> {
    headers: HeaderBuffer<'a>,
    method: Method,
    persistent: bool,
    is_async: bool,
    body: Option<&'a [u8]>,
    user_agent: &'static str,
}

impl<'a> Request<'a> {
    /// Formats a new request into `buffer` with the default user agent.
    pub fn initialize(buffer: &'a mut [u8], info: &RequestInfo<'a>) -> Result<Self, Error> {
        Self::with_user_agent(buffer, info, DEFAULT_USER_AGENT)
    }

    pub(crate) fn with_user_agent(
        buffer: &'a mut [u8],
        info: &RequestInfo<'a>,
        user_agent: &'static str,
    ) -> Result<Self, Error> {
        if buffer.len() < REQUEST_BUFFER_MIN_SIZE {
            return Err(Error::InsufficientMemory);
        }
        check_value(user_agent)?;
        let mut request = Self {
            headers: HeaderBuffer::new(buffer),
            method: info.method,
            persistent: info.persistent,
            is_async: info.is_async,
            body: None,
            user_agent,
        };
        request.reinitialize(info)?;
        Ok(request)
    }

    /// Reuses the buffer for a new request, discarding every header added so
    /// far. On error the previous content is left untouched.
    pub fn reinitialize(&mut self, info: &RequestInfo<'a>) -> Result<(), Error> {
        info.validate()?;
        let method = info.method.as_str().as_bytes();
        let parts: [&[u8]; 10] = [
            method,
            b" ",
            info.path.as_bytes(),
            b" HTTP/1.1\r\n",
            b"User-Agent: ",
            self.user_agent.as_bytes(),
            CRLF,
            b"Host: ",
            info.host.as_bytes(),
            CRLF,
        ];
        let needed: usize = parts.iter().map(|p| p.len()).sum();
        if needed > self.headers.capacity() {
            return Err(Error::InsufficientMemory);
        }
        self.headers.clear();
        self.headers.push_all(&parts)?;
        self.method = info.method;
        self.persistent = info.persistent;
        self.is_async = info.is_async;
        self.body = info.body;
        Ok(())
    }

    /// Appends `"name: value\r\n"`. Reserved headers are `InvalidParameter`,
    /// a line that does not fit is `InsufficientMemory`; either way the
    /// buffer is unchanged.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.headers.append(name, value)
    }

    /// Value of the first stored header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .value(name)
            .and_then(|v| core::str::from_utf8(v).ok())
    }

    /// The underlying header store.
    pub fn headers(&self) -> &HeaderBuffer<'a> {
        &self.headers
    }

    /// Request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Whether the connection is kept open after the response.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Whether the request is meant for `send_async`.
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Synchronous request body.
    pub fn body(&self) -> Option<&'a [u8]> {
        self.body
    }

    /// Gives the buffer back to the caller.
    pub fn into_buffer(self) -> &'a mut [u8] {
        self.headers.into_inner()
    }

    /// The headers the engine appends when sending.
    pub(crate) fn trailer(
        &self,
        body_len: Option<usize>,
    ) -> Result<String<TRAILER_CAPACITY>, Error> {
        let mut trailer = String::new();
        let connection = if self.persistent { "keep-alive" } else { "close" };
        write!(trailer, "Connection: {}\r\n", connection).map_err(|_| Error::InternalError)?;
        if let Some(len) = body_len {
            write!(trailer, "Content-Length: {}\r\n", len).map_err(|_| Error::InternalError)?;
        }
        trailer.push_str("\r\n").map_err(|_| Error::InternalError)?;
        Ok(trailer)
    }
}
