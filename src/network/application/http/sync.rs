//! Blocking request/response exchange.

use super::connection::{Connection, Statistics, Wire};
use super::error::Error;
use super::exchange::{drain_body, receive_head, transmit};
use super::request::Request;
use super::response::Response;
use crate::network::Connect;

impl<'a, N: Connect> Connection<'a, N> {
    /// Sends `request` and blocks until the whole response has been received
    /// into `response`.
    ///
    /// The session is opened first if needed. Asynchronous operations queued
    /// before this call are completed first, in order.
    ///
    /// `timeout_ms` bounds the whole round trip, measured on the transport
    /// clock from the moment the request is sent; `0` waits indefinitely.
    /// A body larger than the response body buffer is still read to its end
    /// and reported as `MessageTooLarge`, with the first bytes kept; without
    /// a body buffer the body is dropped. Any transport failure closes the
    /// session. The response is cleared before anything is sent, so after a
    /// failure it never shows an earlier exchange.
    ///
    /// # Errors
    ///
    /// `Busy` when queued asynchronous operations cannot run because
    /// [`ASYNC_QUEUE_DEPTH`](super::ASYNC_QUEUE_DEPTH) completions are still
    /// waiting to be collected. Drain them with
    /// [`take_completion`](Connection::take_completion) and call again; no
    /// byte of this request has been sent. `TimeoutError` when the round trip
    /// outlives `timeout_ms`.
    ///
    /// ```rust,no_run
    /// # use libiot_https::network::application::http::*;
    /// # fn demo<N: libiot_https::network::Connect>(conn: &mut Connection<'_, N>, client: &Client) -> Result<(), Error> {
    /// let mut req_buf = [0u8; 256];
    /// let mut head_buf = [0u8; 512];
    /// let mut body_buf = [0u8; 1024];
    /// let request = client.initialize_request(&mut req_buf, &RequestInfo::get("/status", "example.com"))?;
    /// let mut response = Response::new(&mut head_buf, Some(&mut body_buf))?;
    /// conn.send_sync(&request, &mut response, 5_000)?;
    /// assert_eq!(response.status()?, 200);
    /// # Ok(())
    /// # }
    /// ```
    pub fn send_sync(
        &mut self,
        request: &Request<'_>,
        response: &mut Response<'_>,
        timeout_ms: u32,
    ) -> Result<(), Error> {
        if request.is_async() {
            return Err(Error::InvalidParameter);
        }
        self.run_pending();
        if !self.queue.is_empty() {
            return Err(Error::Busy);
        }
        self.ensure_connected()?;

        self.begin_exchange(timeout_ms);
        debug!("sync {} request", request.method());
        let result = exchange(&mut self.link, request, response, &mut self.stats);
        let in_sync = matches!(result, Ok(()) | Err(Error::MessageTooLarge));
        self.end_exchange(result.err(), in_sync, request.is_persistent());
        if let Err(e) = result {
            warn!("sync exchange failed: {}", e);
        }
        result
    }
}

fn exchange(
    wire: &mut dyn Wire,
    request: &Request<'_>,
    response: &mut Response<'_>,
    stats: &mut Statistics,
) -> Result<(), Error> {
    response.reset();
    transmit(wire, request, request.body())?;
    stats.requests_sent = stats.requests_sent.saturating_add(1);
    receive_head(wire, response, request.method())?;
    stats.responses_received = stats.responses_received.saturating_add(1);
    stats.discard_header(response.discarded_header_bytes());
    let store = response.body_capacity() > 0;
    drain_body(wire, response, stats, store)
}
