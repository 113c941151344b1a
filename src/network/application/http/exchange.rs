//! Protocol steps shared by the synchronous and asynchronous engines.

use super::connection::{Statistics, Wire};
use super::error::Error;
use super::header::{HeadScanner, find_crlf, parse_status};
use super::request::{Method, Request};
use super::response::{Framing, Response};

/// Sends the stored request line and headers followed by the trailer.
pub(crate) fn transmit_head(
    wire: &mut dyn Wire,
    request: &Request<'_>,
    body_len: Option<usize>,
) -> Result<(), Error> {
    let trailer = request.trailer(body_len)?;
    trace!("sending {} header bytes", request.headers().len());
    wire.send(request.headers().as_bytes())?;
    wire.send(trailer.as_bytes())
}

/// Sends a complete request with its optional body.
pub(crate) fn transmit(
    wire: &mut dyn Wire,
    request: &Request<'_>,
    body: Option<&[u8]>,
) -> Result<(), Error> {
    transmit_head(wire, request, body.map(<[u8]>::len))?;
    if let Some(body) = body {
        wire.send(body)?;
    }
    wire.flush()
}

/// Receives a header block into `response` and decides how its body is
/// framed. Interim `1xx` responses other than `101` are skipped.
pub(crate) fn receive_head(
    wire: &mut dyn Wire,
    response: &mut Response<'_>,
    method: Method,
) -> Result<(), Error> {
    loop {
        response.reset();
        let mut scanner = HeadScanner::default();
        let mut received = 0usize;
        loop {
            let chunk = wire.fill()?;
            if chunk.is_empty() {
                warn!("stream closed after {} header bytes", received);
                return Err(if received == 0 {
                    Error::NetworkError
                } else {
                    Error::ParsingError
                });
            }
            let scan = scanner.feed(chunk);
            response.push_head(&chunk[..scan.consumed]);
            wire.consume(scan.consumed);
            received += scan.consumed;
            if scan.first_line_done {
                let raw = response.headers().as_bytes();
                let line = match find_crlf(raw) {
                    Some(end) => &raw[..end],
                    None => raw,
                };
                let status = parse_status(line)?;
                response.set_status(status);
            }
            if scan.complete {
                break;
            }
        }

        let status = response.status()?;
        if (100..200).contains(&status) && status != 101 {
            debug!("skipping interim response {}", status);
            continue;
        }
        if response.discarded_header_bytes() > 0 {
            debug!(
                "dropped {} header bytes that did not fit",
                response.discarded_header_bytes()
            );
        }

        let framing = if method == Method::Head || matches!(status, 100..=199 | 204 | 304) {
            Framing::Empty
        } else if response.is_chunked() {
            warn!("chunked transfer encoding is not supported");
            return Err(Error::NotSupported);
        } else {
            match response.declared_length()? {
                Some(0) => Framing::Empty,
                Some(remaining) => Framing::Length { remaining },
                None => Framing::UntilClose,
            }
        };
        response.set_framing(framing);
        return Ok(());
    }
}

/// Reads body bytes directly into `out`. Returns `0` once the body is
/// complete.
pub(crate) fn read_body(
    wire: &mut dyn Wire,
    response: &mut Response<'_>,
    out: &mut [u8],
) -> Result<usize, Error> {
    if response.is_finished() || out.is_empty() {
        return Ok(0);
    }
    let chunk = wire.fill()?;
    if chunk.is_empty() {
        return end_of_stream(response).map(|_| 0);
    }
    let n = allowed(response, chunk.len()).min(out.len());
    out[..n].copy_from_slice(&chunk[..n]);
    wire.consume(n);
    response.consume_body(n);
    Ok(n)
}

/// Reads the rest of the body, storing it in the response body buffer when
/// `store` is set and dropping it otherwise.
///
/// The body is always read to its end so the session stays usable; bytes
/// that do not fit in the body buffer end the exchange with
/// `MessageTooLarge` after that.
pub(crate) fn drain_body(
    wire: &mut dyn Wire,
    response: &mut Response<'_>,
    stats: &mut Statistics,
    store: bool,
) -> Result<(), Error> {
    let mut overflow = false;
    while !response.is_finished() {
        let chunk = wire.fill()?;
        if chunk.is_empty() {
            end_of_stream(response)?;
            break;
        }
        let take = allowed(response, chunk.len());
        let kept = if store {
            let spare = response.body_spare();
            let n = take.min(spare.len());
            spare[..n].copy_from_slice(&chunk[..n]);
            n
        } else {
            0
        };
        wire.consume(take);
        response.advance_body(kept);
        response.consume_body(take);
        if kept < take {
            stats.discard_body(take - kept);
            overflow |= store;
        }
    }
    if overflow {
        warn!(
            "body exceeded the {} byte buffer",
            response.body_capacity()
        );
        return Err(Error::MessageTooLarge);
    }
    Ok(())
}

/// Body bytes of a chunk of `available` bytes that belong to this response.
fn allowed(response: &Response<'_>, available: usize) -> usize {
    match response.framing() {
        Framing::Length { remaining } => available.min(remaining as usize),
        _ => available,
    }
}

fn end_of_stream(response: &mut Response<'_>) -> Result<(), Error> {
    match response.framing() {
        Framing::UntilClose => {
            response.finish_body();
            Ok(())
        }
        _ => {
            warn!("stream closed before the end of the body");
            Err(Error::NetworkError)
        }
    }
}
