//! Header store and parser over a [`HeaderBuffer`].
//!
//! Headers are never materialized. Appending formats `"Name: value\r\n"` at the
//! cursor; lookups re-scan the raw bytes and only consider lines that were
//! stored complete, so a header cut off by the end of the buffer reads as
//! absent instead of yielding a partial value.

use super::buffer::HeaderBuffer;
use super::error::Error;

/// Headers the engine emits itself. Callers may not add them.
pub const RESERVED_HEADERS: [&str; 4] = ["Host", "User-Agent", "Connection", "Content-Length"];

pub(crate) const CRLF: &[u8] = b"\r\n";
const SEPARATOR: &[u8] = b": ";

/// `true` if `name` is one of [`RESERVED_HEADERS`], ignoring ASCII case.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Rejects empty names and names that would break the header line.
pub(crate) fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty()
        || name
            .bytes()
            .any(|b| matches!(b, b':' | b'\r' | b'\n' | b' ' | b'\t'))
    {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}

/// Rejects values that would inject a new line.
pub(crate) fn check_value(value: &str) -> Result<(), Error> {
    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}

impl HeaderBuffer<'_> {
    /// Appends `"name: value\r\n"`.
    ///
    /// Fails with `InvalidParameter` for reserved or malformed names and with
    /// `InsufficientMemory` when the line does not fit. On failure the cursor
    /// is unchanged.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if is_reserved(name) {
            return Err(Error::InvalidParameter);
        }
        self.append_line(name, value)
    }

    /// Same as [`append`](Self::append) without the reserved-name check.
    pub(crate) fn append_line(&mut self, name: &str, value: &str) -> Result<(), Error> {
        check_name(name)?;
        check_value(value)?;
        self.push_all(&[name.as_bytes(), SEPARATOR, value.as_bytes(), CRLF])
    }

    /// Offset and length of the value of the first complete header line named
    /// `name`.
    pub fn find(&self, name: &str) -> Option<(usize, usize)> {
        find_header(self.as_bytes(), name)
    }

    /// Value bytes of the first complete header line named `name`.
    pub fn value(&self, name: &str) -> Option<&[u8]> {
        self.find(name)
            .map(|(offset, len)| &self.as_bytes()[offset..offset + len])
    }

    /// Status code from a complete `"HTTP/1.x NNN reason"` first line.
    pub fn status_line(&self) -> Option<u16> {
        let raw = self.as_bytes();
        let end = find_crlf(raw)?;
        parse_status(&raw[..end]).ok()
    }

    /// Numeric value of `Content-Length`, if stored and well formed.
    pub fn content_length(&self) -> Option<u32> {
        self.value("Content-Length").and_then(parse_u32)
    }
}

/// Scans complete lines after the first one for `name`.
pub(crate) fn find_header(raw: &[u8], name: &str) -> Option<(usize, usize)> {
    let mut start = find_crlf(raw)? + CRLF.len();
    while let Some(rel) = find_crlf(&raw[start..]) {
        let line = &raw[start..start + rel];
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let field = trim(&line[..colon]);
            if field.eq_ignore_ascii_case(name.as_bytes()) {
                let value_start = colon + 1 + leading_ws(&line[colon + 1..]);
                let value = trim(&line[value_start..]);
                return Some((start + value_start, value.len()));
            }
        }
        start += rel + CRLF.len();
    }
    None
}

/// Parses the `HTTP/1.x NNN` prefix of a status line.
pub(crate) fn parse_status(line: &[u8]) -> Result<u16, Error> {
    const PREFIX: &[u8] = b"HTTP/1.";
    if line.len() < 12 || !line.starts_with(PREFIX) {
        return Err(Error::ParsingError);
    }
    if !line[7].is_ascii_digit() || line[8] != b' ' {
        return Err(Error::ParsingError);
    }
    let code = &line[9..12];
    if !code.iter().all(u8::is_ascii_digit) || (line.len() > 12 && line[12] != b' ') {
        return Err(Error::ParsingError);
    }
    let status = code
        .iter()
        .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
    if status < 100 {
        return Err(Error::ParsingError);
    }
    Ok(status)
}

/// Decimal `u32` with surrounding whitespace tolerated.
pub(crate) fn parse_u32(bytes: &[u8]) -> Option<u32> {
    let digits = trim(bytes);
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u32, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
    })
}

pub(crate) fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == CRLF)
}

fn leading_ws(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|b| **b == b' ' || **b == b'\t')
        .count()
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = leading_ws(bytes);
    let end = bytes.len()
        - bytes[start..]
            .iter()
            .rev()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
    &bytes[start..end]
}

/// Tracks the `\r\n\r\n` terminator of a header block across reads.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct HeadScanner {
    matched: u8,
    first_line_done: bool,
}

/// What one chunk contributed to the header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scan {
    /// Bytes of the chunk that belong to the header block.
    pub consumed: usize,
    /// The status line ended within this chunk.
    pub first_line_done: bool,
    /// The blank line terminating the block was seen.
    pub complete: bool,
}

impl HeadScanner {
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Scan {
        let mut first_line_done = false;
        for (i, &b) in chunk.iter().enumerate() {
            self.matched = match (b, self.matched) {
                (b'\r', 0) | (b'\r', 2) => self.matched + 1,
                (b'\r', _) => 1,
                (b'\n', 1) | (b'\n', 3) => self.matched + 1,
                _ => 0,
            };
            if self.matched == 2 && !self.first_line_done {
                self.first_line_done = true;
                first_line_done = true;
            }
            if self.matched == 4 {
                return Scan {
                    consumed: i + 1,
                    first_line_done,
                    complete: true,
                };
            }
        }
        Scan {
            consumed: chunk.len(),
            first_line_done,
            complete: false,
        }
    }
}

/// A parsed `Content-Range: bytes N-M/TOTAL` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First and last byte positions, inclusive. `None` for `bytes */TOTAL`.
    pub range: Option<(u32, u32)>,
    /// Complete length of the resource. `None` when the server sent `*`.
    pub total: Option<u32>,
}

impl ContentRange {
    /// Parses a `Content-Range` header value.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let rest = value
            .trim()
            .strip_prefix("bytes")
            .ok_or(Error::ParsingError)?
            .trim_start();
        let (span, total) = rest.split_once('/').ok_or(Error::ParsingError)?;

        let total = match total.trim() {
            "*" => None,
            t => Some(parse_u32(t.as_bytes()).ok_or(Error::ParsingError)?),
        };
        let range = match span.trim() {
            "*" => None,
            s => {
                let (first, last) = s.split_once('-').ok_or(Error::ParsingError)?;
                let first = parse_u32(first.as_bytes()).ok_or(Error::ParsingError)?;
                let last = parse_u32(last.as_bytes()).ok_or(Error::ParsingError)?;
                if last < first {
                    return Err(Error::ParsingError);
                }
                Some((first, last))
            }
        };
        if range.is_none() && total.is_none() {
            return Err(Error::ParsingError);
        }
        Ok(Self { range, total })
    }

    /// Number of bytes in the range. A range covering every `u32` position
    /// holds 2^32 bytes, hence the wider type.
    pub fn len(&self) -> u64 {
        self.range
            .map_or(0, |(first, last)| u64::from(last) - u64::from(first) + 1)
    }

    /// `true` for an unsatisfied range.
    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }
}
