//! Response storage over caller-owned buffers.

use super::buffer::HeaderBuffer;
use super::error::Error;
use super::header::parse_u32;

/// Smallest response header buffer accepted by [`Response::new`].
pub const RESPONSE_BUFFER_MIN_SIZE: usize = 64;

/// How the body of the current response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// Headers not received yet.
    Pending,
    /// No body follows (HEAD, 1xx, 204, 304).
    Empty,
    /// `remaining` bytes of a Content-Length body are still on the wire.
    Length { remaining: u32 },
    /// The body ends when the server closes the connection.
    UntilClose,
    /// The whole body has been consumed.
    Done,
}

/// A received response: the raw status line and header lines up to the
/// capacity of the header buffer, and optionally the body.
///
/// Header bytes that do not fit are dropped without failing the exchange;
/// lookups for those headers report `NotFound`.
#[derive(Debug)]
pub struct Response<'a> {
    headers: HeaderBuffer<'a>,
    body: Option<&'a mut [u8]>,
    body_len: usize,
    status: Option<u16>,
    framing: Framing,
    discarded: usize,
}

impl<'a> Response<'a> {
    /// Wraps the caller's header buffer and optional body buffer.
    pub fn new(headers: &'a mut [u8], body: Option<&'a mut [u8]>) -> Result<Self, Error> {
        if headers.len() < RESPONSE_BUFFER_MIN_SIZE {
            return Err(Error::InsufficientMemory);
        }
        Ok(Self {
            headers: HeaderBuffer::new(headers),
            body,
            body_len: 0,
            status: None,
            framing: Framing::Pending,
            discarded: 0,
        })
    }

    /// Status code of the response.
    pub fn status(&self) -> Result<u16, Error> {
        self.status.ok_or(Error::NotFound)
    }

    /// Value of the `Content-Length` header.
    pub fn content_length(&self) -> Result<u32, Error> {
        self.headers.content_length().ok_or(Error::NotFound)
    }

    /// Copies the value of header `name` into `out` and returns its length.
    pub fn read_header(&self, name: &str, out: &mut [u8]) -> Result<usize, Error> {
        let value = self.headers.value(name).ok_or(Error::NotFound)?;
        if value.len() > out.len() {
            return Err(Error::InsufficientMemory);
        }
        out[..value.len()].copy_from_slice(value);
        Ok(value.len())
    }

    /// Value of header `name` borrowed from the header buffer.
    pub fn header(&self, name: &str) -> Result<&str, Error> {
        let value = self.headers.value(name).ok_or(Error::NotFound)?;
        core::str::from_utf8(value).map_err(|_| Error::InvalidPayload)
    }

    /// The raw header store.
    pub fn headers(&self) -> &HeaderBuffer<'a> {
        &self.headers
    }

    /// Body bytes stored so far.
    pub fn body(&self) -> &[u8] {
        match &self.body {
            Some(body) => &body[..self.body_len],
            None => &[],
        }
    }

    /// Size of the body buffer, zero when none was supplied.
    pub fn body_capacity(&self) -> usize {
        self.body.as_ref().map_or(0, |b| b.len())
    }

    /// Header bytes dropped because the header buffer was full.
    pub fn discarded_header_bytes(&self) -> usize {
        self.discarded
    }

    /// `true` once the header block has been received.
    pub fn headers_complete(&self) -> bool {
        self.framing != Framing::Pending
    }

    /// `true` once the body has been fully consumed from the connection.
    pub fn is_finished(&self) -> bool {
        matches!(self.framing, Framing::Empty | Framing::Done)
    }

    /// Gives the buffers back to the caller.
    pub fn into_buffers(self) -> (&'a mut [u8], Option<&'a mut [u8]>) {
        (self.headers.into_inner(), self.body)
    }

    pub(crate) fn reset(&mut self) {
        self.headers.clear();
        self.body_len = 0;
        self.status = None;
        self.framing = Framing::Pending;
        self.discarded = 0;
    }

    /// Stores header bytes, dropping what does not fit.
    pub(crate) fn push_head(&mut self, bytes: &[u8]) {
        let kept = self.headers.push_truncated(bytes);
        self.discarded += bytes.len() - kept;
    }

    pub(crate) fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub(crate) fn framing(&self) -> Framing {
        self.framing
    }

    pub(crate) fn set_framing(&mut self, framing: Framing) {
        self.framing = framing;
    }

    /// Consumes `n` body bytes from the framing budget.
    pub(crate) fn consume_body(&mut self, n: usize) {
        if let Framing::Length { remaining } = self.framing {
            let left = remaining.saturating_sub(n as u32);
            self.framing = if left == 0 {
                Framing::Done
            } else {
                Framing::Length { remaining: left }
            };
        }
    }

    /// The peer closed the stream.
    pub(crate) fn finish_body(&mut self) {
        self.framing = Framing::Done;
    }

    /// Free tail of the body buffer.
    pub(crate) fn body_spare(&mut self) -> &mut [u8] {
        match &mut self.body {
            Some(body) => &mut body[self.body_len..],
            None => &mut [],
        }
    }

    pub(crate) fn advance_body(&mut self, n: usize) {
        self.body_len += n;
    }

    /// Raw `Transfer-Encoding` and `Content-Length` checks done once the
    /// header block is complete.
    pub(crate) fn declared_length(&self) -> Result<Option<u32>, Error> {
        match self.headers.value("Content-Length") {
            Some(raw) => parse_u32(raw).map(Some).ok_or(Error::ParsingError),
            None => Ok(None),
        }
    }

    pub(crate) fn is_chunked(&self) -> bool {
        self.headers
            .value("Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case(b"chunked"))
    }
}
