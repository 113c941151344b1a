//! Caller-owned byte region with a write cursor.
//!
//! The same type backs the request side (formatted request line and headers)
//! and the response side (raw status line and header lines as received).

use super::error::Error;

/// A fixed byte region borrowed from the caller plus a write cursor.
///
/// Bytes `[0, len)` are meaningful; the rest is free space. The buffer never
/// grows and never allocates.
#[derive(Debug)]
pub struct HeaderBuffer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> HeaderBuffer<'a> {
    /// Wraps `buf` with the cursor at zero.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Total size of the region.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Position of the write cursor.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free bytes after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Moves the cursor back to zero, discarding the content.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Moves the cursor back to `len` if it is behind the current position.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Appends all of `parts` or nothing. On `InsufficientMemory` the cursor is
    /// unchanged.
    pub fn push_all(&mut self, parts: &[&[u8]]) -> Result<(), Error> {
        let needed: usize = parts.iter().map(|p| p.len()).sum();
        if needed > self.remaining() {
            return Err(Error::InsufficientMemory);
        }
        for part in parts {
            self.buf[self.len..self.len + part.len()].copy_from_slice(part);
            self.len += part.len();
        }
        Ok(())
    }

    /// Appends as much of `bytes` as fits and returns how many bytes were kept.
    pub fn push_truncated(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }

    /// Gives the borrowed region back to the caller.
    pub fn into_inner(self) -> &'a mut [u8] {
        self.buf
    }
}
