//! Callback-driven exchanges queued on a connection.
//!
//! [`Connection::send_async`] takes ownership of the request and response and
//! queues them with a [`ResponseHandler`]. Nothing happens on the wire until
//! the application's scheduler calls [`Connection::run_once`] (or
//! [`Connection::run_pending`]), which runs the oldest queued exchange to its
//! end, invoking the handler at each step:
//!
//! 1. [`append_header`](ResponseHandler::append_header) before anything is
//!    sent, to add headers or cancel.
//! 2. [`write_body`](ResponseHandler::write_body), where the body can be
//!    supplied in one piece. The headers are sent here if the handler does
//!    not write a body.
//! 3. [`read_ready`](ResponseHandler::read_ready) once the response headers
//!    are in, and again while the handler keeps consuming body bytes.
//! 4. [`error`](ResponseHandler::error) on transport or internal failures.
//! 5. [`response_complete`](ResponseHandler::response_complete), always last.
//!
//! The finished exchange comes back as a [`Completion`] carrying the request,
//! the response and the handler, so the buffers can be reused.

use core::fmt;

use super::connection::{Connection, Statistics, Wire};
use super::error::Error;
use super::exchange::{drain_body, read_body, receive_head, transmit_head};
use super::request::Request;
use super::response::Response;
use crate::network::Connect;

/// Identifies one asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u32);

impl JobId {
    /// Numeric value, unique per client.
    pub fn value(&self) -> u32 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JobId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "#{}", self.0)
    }
}

/// Progress of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    /// Queued, nothing sent.
    Scheduled,
    /// Request headers sent without a body.
    HeadersSent,
    /// Request headers and body sent.
    BodySent,
    /// Response headers received.
    HeadersReceived,
    /// The handler is consuming the response body.
    BodyReceiving,
    /// The response was received.
    Complete,
    /// Stopped by a cancellation.
    Cancelled,
    /// Stopped by a transport or protocol failure.
    Failed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for AsyncState {
    fn format(&self, f: defmt::Formatter) {
        let name = match self {
            AsyncState::Scheduled => "Scheduled",
            AsyncState::HeadersSent => "HeadersSent",
            AsyncState::BodySent => "BodySent",
            AsyncState::HeadersReceived => "HeadersReceived",
            AsyncState::BodyReceiving => "BodyReceiving",
            AsyncState::Complete => "Complete",
            AsyncState::Cancelled => "Cancelled",
            AsyncState::Failed => "Failed",
        };
        defmt::write!(f, "{=str}", name)
    }
}

/// Callbacks of an asynchronous operation. Only
/// [`response_complete`](ResponseHandler::response_complete) is required.
///
/// ```rust
/// use libiot_https::network::application::http::{Error, Response, ResponseHandler, ResponseReader};
///
/// #[derive(Default)]
/// struct Checksum {
///     sum: u32,
///     done: bool,
/// }
///
/// impl ResponseHandler for Checksum {
///     fn read_ready(&mut self, reader: &mut ResponseReader<'_, '_>, _status: u16) {
///         let mut chunk = [0u8; 64];
///         while let Ok(n @ 1..) = reader.read_response_body(&mut chunk) {
///             self.sum = chunk[..n].iter().fold(self.sum, |s, b| s.wrapping_add(u32::from(*b)));
///         }
///     }
///
///     fn response_complete(&mut self, _response: &Response<'_>, outcome: Result<(), Error>) {
///         self.done = outcome.is_ok();
///     }
/// }
/// ```
pub trait ResponseHandler {
    /// Called before the request is sent. Headers may be added and the
    /// request may be cancelled.
    fn append_header(&mut self, _request: &mut RequestContext<'_, '_>) {}

    /// Called once the session is open. The body, if any, must be written
    /// here in a single call.
    fn write_body(&mut self, _writer: &mut BodyWriter<'_, '_>) {}

    /// Called when the response headers have been received and again after
    /// each call that consumed body bytes, until the body is complete. Body
    /// bytes not read here are stored in the response body buffer.
    fn read_ready(&mut self, _reader: &mut ResponseReader<'_, '_>, _status: u16) {}

    /// Called on a transport or protocol failure, before
    /// [`response_complete`](ResponseHandler::response_complete).
    fn error(&mut self, _error: Error) {}

    /// Called exactly once when the operation ends, whatever the outcome.
    fn response_complete(&mut self, response: &Response<'_>, outcome: Result<(), Error>);
}

/// Access to the request before it is sent.
pub struct RequestContext<'j, 'a> {
    request: &'j mut Request<'a>,
    cancelled: bool,
}

impl<'a> RequestContext<'_, 'a> {
    /// Appends a header to the request.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if self.cancelled {
            return Err(Error::SendAborted);
        }
        self.request.add_header(name, value)
    }

    /// The request as formatted so far.
    pub fn request(&self) -> &Request<'a> {
        self.request
    }

    /// Abandons the operation. Nothing is sent.
    pub fn cancel_request(&mut self) {
        self.cancelled = true;
    }
}

impl fmt::Debug for RequestContext<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// Sends the request body of an asynchronous operation.
pub struct BodyWriter<'j, 'a> {
    wire: &'j mut dyn Wire,
    request: &'j Request<'a>,
    written: bool,
    cancelled: bool,
    failure: Option<Error>,
}

impl<'a> BodyWriter<'_, 'a> {
    /// Sends the headers followed by `body`.
    ///
    /// Only a complete body in one call is supported: `is_complete == false`
    /// fails with `NotSupported` and a second call with `MessageFinished`.
    pub fn write_request_body(&mut self, body: &[u8], is_complete: bool) -> Result<(), Error> {
        if self.cancelled {
            return Err(Error::SendAborted);
        }
        if self.written {
            return Err(Error::MessageFinished);
        }
        if !is_complete {
            return Err(Error::NotSupported);
        }
        let sent = transmit_head(self.wire, self.request, Some(body.len()))
            .and_then(|()| self.wire.send(body))
            .and_then(|()| self.wire.flush());
        self.written = true;
        if let Err(e) = sent {
            self.failure = Some(e);
        }
        sent
    }

    /// The request being sent.
    pub fn request(&self) -> &Request<'a> {
        self.request
    }

    /// Abandons the operation. If the body was already written the session
    /// is closed.
    pub fn cancel_request(&mut self) {
        self.cancelled = true;
    }
}

impl fmt::Debug for BodyWriter<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyWriter")
            .field("written", &self.written)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

/// Reads the response of an asynchronous operation.
pub struct ResponseReader<'j, 'a> {
    wire: &'j mut dyn Wire,
    response: &'j mut Response<'a>,
    stats: &'j mut Statistics,
    progressed: bool,
    cancelled: bool,
    failure: Option<Error>,
}

impl<'a> ResponseReader<'_, 'a> {
    /// Copies the next body bytes into `buf`. `Ok(0)` means the body is
    /// complete.
    pub fn read_response_body(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.cancelled {
            return Err(Error::ReceiveAborted);
        }
        match read_body(self.wire, self.response, buf) {
            Ok(n) => {
                self.progressed |= n > 0;
                Ok(n)
            }
            Err(e) => {
                self.failure = Some(e);
                Err(e)
            }
        }
    }

    /// Status code of the response.
    pub fn status(&self) -> Result<u16, Error> {
        self.response.status()
    }

    /// Value of the `Content-Length` header.
    pub fn content_length(&self) -> Result<u32, Error> {
        self.response.content_length()
    }

    /// Copies the value of header `name` into `out`.
    pub fn read_header(&self, name: &str, out: &mut [u8]) -> Result<usize, Error> {
        self.response.read_header(name, out)
    }

    /// The response received so far.
    pub fn response(&self) -> &Response<'a> {
        self.response
    }

    /// `true` once the whole body has been consumed.
    pub fn is_finished(&self) -> bool {
        self.response.is_finished()
    }

    /// Stops receiving. The rest of the response is abandoned and the session
    /// closed.
    pub fn cancel_response(&mut self) {
        self.cancelled = true;
    }

    /// Body bytes dropped on this connection so far.
    pub fn discarded_body_bytes(&self) -> u32 {
        self.stats.body_bytes_discarded
    }
}

impl fmt::Debug for ResponseReader<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseReader")
            .field("response", &self.response)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

/// A queued operation.
pub(crate) struct Job<'a> {
    pub(crate) id: JobId,
    pub(crate) request: Request<'a>,
    pub(crate) response: Response<'a>,
    pub(crate) handler: &'a mut dyn ResponseHandler,
    pub(crate) cancel: Option<Error>,
}

/// A finished asynchronous operation and the resources it borrowed.
pub struct Completion<'a> {
    /// Identifier returned by `send_async`.
    pub id: JobId,
    /// `Complete`, `Cancelled` or `Failed`.
    pub state: AsyncState,
    /// The outcome also passed to `response_complete`.
    pub outcome: Result<(), Error>,
    /// The request, ready to be reinitialized.
    pub request: Request<'a>,
    /// The received response.
    pub response: Response<'a>,
    /// The handler, ready for another operation.
    pub handler: &'a mut dyn ResponseHandler,
}

impl fmt::Debug for Completion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("outcome", &self.outcome)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// An operation `send_async` refused, with everything it was given.
pub struct Rejected<'a> {
    /// Why the operation was refused.
    pub error: Error,
    /// The request, untouched.
    pub request: Request<'a>,
    /// The response, untouched.
    pub response: Response<'a>,
    /// The handler, never invoked.
    pub handler: &'a mut dyn ResponseHandler,
}

impl fmt::Debug for Rejected<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<'a, N: Connect> Connection<'a, N> {
    /// Queues an asynchronous operation and returns immediately.
    ///
    /// The request must have been initialized with `is_async` set. When the
    /// queue is full the operation is refused with `QueueFull` and handed
    /// back untouched.
    pub fn send_async(
        &mut self,
        request: Request<'a>,
        response: Response<'a>,
        handler: &'a mut dyn ResponseHandler,
    ) -> Result<JobId, Rejected<'a>> {
        if !request.is_async() {
            self.stats.rejected = self.stats.rejected.saturating_add(1);
            return Err(Rejected {
                error: Error::InvalidParameter,
                request,
                response,
                handler,
            });
        }
        let id = self.client.next_job_id();
        let job = Job {
            id,
            request,
            response,
            handler,
            cancel: None,
        };
        match self.queue.push_back(job) {
            Ok(()) => {
                debug!("job {} scheduled", id);
                Ok(id)
            }
            Err(job) => {
                warn!("job {} refused, queue full", id);
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                Err(Rejected {
                    error: Error::QueueFull,
                    request: job.request,
                    response: job.response,
                    handler: job.handler,
                })
            }
        }
    }

    /// Cancels a queued operation before anything is sent. Its handler still
    /// receives `response_complete` with `SendAborted` when it is run.
    pub fn cancel_request_async(&mut self, id: JobId) -> Result<(), Error> {
        self.mark_cancelled(id, Error::SendAborted)
    }

    /// Like [`cancel_request_async`](Connection::cancel_request_async), with
    /// `ReceiveAborted` as the outcome.
    pub fn cancel_response_async(&mut self, id: JobId) -> Result<(), Error> {
        self.mark_cancelled(id, Error::ReceiveAborted)
    }

    fn mark_cancelled(&mut self, id: JobId, reason: Error) -> Result<(), Error> {
        let job = self
            .queue
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or(Error::NotFound)?;
        job.cancel = Some(reason);
        Ok(())
    }

    /// `Scheduled` for a queued operation, the final state for one whose
    /// completion has not been taken yet, `None` otherwise.
    pub fn job_state(&self, id: JobId) -> Option<AsyncState> {
        if self.queue.iter().any(|job| job.id == id) {
            return Some(AsyncState::Scheduled);
        }
        self.completed.iter().find(|c| c.id == id).map(|c| c.state)
    }

    /// Runs the oldest queued operation to its end.
    pub fn run_once(&mut self) -> Option<Completion<'a>> {
        let mut job = self.queue.pop_front()?;
        let (state, outcome) = self.drive(&mut job);
        debug!("job {} ended {}", job.id, state);
        if let (AsyncState::Failed, Err(e)) = (state, outcome) {
            job.handler.error(e);
        }
        job.handler.response_complete(&job.response, outcome);
        Some(Completion {
            id: job.id,
            state,
            outcome,
            request: job.request,
            response: job.response,
            handler: job.handler,
        })
    }

    /// Runs queued operations while there is room to keep their completions,
    /// and returns how many ran. Collect them with
    /// [`take_completion`](Connection::take_completion).
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while !self.completed.is_full() {
            let Some(done) = self.run_once() else {
                break;
            };
            if self.completed.push_back(done).is_err() {
                error!("completion lost");
            }
            ran += 1;
        }
        ran
    }

    /// Oldest completion stored by [`run_pending`](Connection::run_pending).
    pub fn take_completion(&mut self) -> Option<Completion<'a>> {
        self.completed.pop_front()
    }

    fn drive(&mut self, job: &mut Job<'a>) -> (AsyncState, Result<(), Error>) {
        // Nothing from an earlier exchange may be reported for this one.
        job.response.reset();
        if let Some(reason) = job.cancel {
            self.stats.cancelled = self.stats.cancelled.saturating_add(1);
            return (AsyncState::Cancelled, Err(reason));
        }

        let mut ctx = RequestContext {
            request: &mut job.request,
            cancelled: false,
        };
        job.handler.append_header(&mut ctx);
        if ctx.cancelled {
            self.stats.cancelled = self.stats.cancelled.saturating_add(1);
            return (AsyncState::Cancelled, Err(Error::SendAborted));
        }

        let keep_alive = job.request.is_persistent();
        if let Err(e) = self.ensure_connected() {
            self.end_exchange(Some(e), true, keep_alive);
            return (AsyncState::Failed, Err(e));
        }

        self.begin_exchange(self.config.response_wait_ms());
        let (state, outcome, on_wire) = self.exchange(job);
        if state == AsyncState::Cancelled {
            self.stats.cancelled = self.stats.cancelled.saturating_add(1);
        }
        let in_sync = state == AsyncState::Complete || !on_wire;
        self.end_exchange(outcome.err(), in_sync, keep_alive);
        (state, outcome)
    }

    /// Runs the wire part of an operation. The flag tells whether any byte
    /// of the request reached the transport.
    fn exchange(&mut self, job: &mut Job<'a>) -> (AsyncState, Result<(), Error>, bool) {
        let mut writer = BodyWriter {
            wire: &mut self.link,
            request: &job.request,
            written: false,
            cancelled: false,
            failure: None,
        };
        job.handler.write_body(&mut writer);
        let BodyWriter {
            written,
            cancelled,
            failure,
            ..
        } = writer;
        if let Some(e) = failure {
            return (AsyncState::Failed, Err(e), true);
        }
        if cancelled {
            return (AsyncState::Cancelled, Err(Error::SendAborted), written);
        }
        if written {
            trace!("job {} {}", job.id, AsyncState::BodySent);
        } else {
            let sent =
                transmit_head(&mut self.link, &job.request, None).and_then(|()| self.link.flush());
            if let Err(e) = sent {
                return (AsyncState::Failed, Err(e), true);
            }
            trace!("job {} {}", job.id, AsyncState::HeadersSent);
        }
        self.stats.requests_sent = self.stats.requests_sent.saturating_add(1);

        if let Err(e) = receive_head(&mut self.link, &mut job.response, job.request.method()) {
            return (AsyncState::Failed, Err(e), true);
        }
        self.stats.responses_received = self.stats.responses_received.saturating_add(1);
        self.stats.discard_header(job.response.discarded_header_bytes());
        let status = match job.response.status() {
            Ok(status) => status,
            Err(_) => return (AsyncState::Failed, Err(Error::InternalError), true),
        };
        trace!("job {} {} ({})", job.id, AsyncState::HeadersReceived, status);

        loop {
            let mut reader = ResponseReader {
                wire: &mut self.link,
                response: &mut job.response,
                stats: &mut self.stats,
                progressed: false,
                cancelled: false,
                failure: None,
            };
            job.handler.read_ready(&mut reader, status);
            let ResponseReader {
                progressed,
                cancelled,
                failure,
                ..
            } = reader;
            if let Some(e) = failure {
                return (AsyncState::Failed, Err(e), true);
            }
            if cancelled {
                return (AsyncState::Cancelled, Err(Error::ReceiveAborted), true);
            }
            if job.response.is_finished() {
                return (AsyncState::Complete, Ok(()), true);
            }
            if !progressed {
                break;
            }
            trace!("job {} {}", job.id, AsyncState::BodyReceiving);
        }

        let store = job.response.body_capacity() > 0;
        match drain_body(&mut self.link, &mut job.response, &mut self.stats, store) {
            Ok(()) => (AsyncState::Complete, Ok(()), true),
            Err(Error::MessageTooLarge) => {
                (AsyncState::Complete, Err(Error::MessageTooLarge), true)
            }
            Err(e) => (AsyncState::Failed, Err(e), true),
        }
    }
}
