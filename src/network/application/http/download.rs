//! Range-based download of a large object.
//!
//! The object size is learned with a one byte range request, then the object
//! is fetched in consecutive ranges no larger than the response body buffer.
//! A transport failure on a range is retried once over a fresh session.

use core::fmt::Write as _;

use heapless::String;

use super::connection::Connection;
use super::error::Error;
use super::header::ContentRange;
use super::request::{Request, RequestInfo};
use super::response::Response;
use crate::network::Connect;

/// Longest `Range` header value: `bytes=4294967295-4294967295`.
const RANGE_VALUE_MAX_LENGTH: usize = 27;

/// Result of a finished download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Object size in bytes.
    pub size: u32,
    /// CRC-32 of the object content.
    pub crc32: u32,
}

/// Asks for the first byte of the object and returns the total size from
/// the `Content-Range` header of the `206` answer.
pub fn probe_size<'r, N: Connect>(
    connection: &mut Connection<'_, N>,
    request: &mut Request<'r>,
    info: &RequestInfo<'r>,
    response: &mut Response<'_>,
    timeout_ms: u32,
) -> Result<u32, Error> {
    fetch_range(connection, request, info, response, 0, 0, timeout_ms)?;
    let value = response.header("Content-Range")?;
    let total = ContentRange::parse(value)?.total.ok_or(Error::ParsingError)?;
    info!("object size {} bytes", total);
    Ok(total)
}

/// Downloads the whole object, handing each range to `sink` with its offset.
///
/// The response body buffer bounds the size of each range. The request is
/// reinitialized from `info` for every range.
pub fn download<'r, N, F>(
    connection: &mut Connection<'_, N>,
    request: &mut Request<'r>,
    info: &RequestInfo<'r>,
    response: &mut Response<'_>,
    timeout_ms: u32,
    mut sink: F,
) -> Result<DownloadSummary, Error>
where
    N: Connect,
    F: FnMut(u32, &[u8]) -> Result<(), Error>,
{
    let chunk = u32::try_from(response.body_capacity()).unwrap_or(u32::MAX);
    if chunk == 0 {
        return Err(Error::InvalidParameter);
    }
    let size = probe_size(connection, request, info, response, timeout_ms)?;

    let mut hasher = crc32fast::Hasher::new();
    let mut offset = 0u32;
    while offset < size {
        let last = offset.saturating_add(chunk).min(size) - 1;
        fetch_range(connection, request, info, response, offset, last, timeout_ms)?;
        let data = response.body();
        let expected = (last - offset + 1) as usize;
        if data.is_empty() || data.len() > expected {
            warn!("range {}-{} returned {} bytes", offset, last, data.len());
            return Err(Error::InvalidPayload);
        }
        hasher.update(data);
        sink(offset, data)?;
        offset += data.len() as u32;
        debug!("downloaded {}/{} bytes", offset, size);
    }

    Ok(DownloadSummary {
        size,
        crc32: hasher.finalize(),
    })
}

/// Requests bytes `first..=last` and requires a `206` answer.
fn fetch_range<'r, N: Connect>(
    connection: &mut Connection<'_, N>,
    request: &mut Request<'r>,
    info: &RequestInfo<'r>,
    response: &mut Response<'_>,
    first: u32,
    last: u32,
    timeout_ms: u32,
) -> Result<(), Error> {
    request.reinitialize(info)?;
    let mut range: String<RANGE_VALUE_MAX_LENGTH> = String::new();
    write!(range, "bytes={}-{}", first, last).map_err(|_| Error::InternalError)?;
    request.add_header("Range", &range)?;

    match connection.send_sync(request, response, timeout_ms) {
        Err(e) if e.is_retryable() => {
            warn!("range {}-{} failed ({}), reconnecting", first, last, e);
            connection.connect()?;
            connection.send_sync(request, response, timeout_ms)?;
        }
        result => result?,
    }

    match response.status()? {
        206 => Ok(()),
        status => {
            warn!("server answered {} to a range request", status);
            Err(Error::NotSupported)
        }
    }
}
