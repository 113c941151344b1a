use std::cell::RefCell;

use libiot_https::network::application::http::{
    ASYNC_QUEUE_DEPTH, AsyncState, BodyWriter, Client, ConnectionConfig, Error, Method,
    RequestContext, RequestInfo, Response, ResponseHandler, ResponseReader, State,
};

use crate::mock::{MockServer, Reply, response};

#[derive(Debug, Default)]
struct Log {
    events: Vec<&'static str>,
    statuses: Vec<u16>,
    body: Vec<u8>,
    writes: Vec<Result<(), Error>>,
    errors: Vec<Error>,
    outcomes: Vec<Result<(), Error>>,
}

/// Records every callback and optionally cancels in one of them.
struct Recorder<'l> {
    log: &'l RefCell<Log>,
    cancel_in: Option<&'static str>,
    header: Option<(&'static str, &'static str)>,
    body: Option<&'static [u8]>,
    read_chunk: usize,
}

impl<'l> Recorder<'l> {
    fn new(log: &'l RefCell<Log>) -> Self {
        Self {
            log,
            cancel_in: None,
            header: None,
            body: None,
            read_chunk: 0,
        }
    }
}

impl ResponseHandler for Recorder<'_> {
    fn append_header(&mut self, request: &mut RequestContext<'_, '_>) {
        self.log.borrow_mut().events.push("append_header");
        if let Some((name, value)) = self.header {
            request.add_header(name, value).unwrap();
        }
        if self.cancel_in == Some("append_header") {
            request.cancel_request();
        }
    }

    fn write_body(&mut self, writer: &mut BodyWriter<'_, '_>) {
        let mut log = self.log.borrow_mut();
        log.events.push("write_body");
        if let Some(body) = self.body {
            log.writes.push(writer.write_request_body(body, false));
            log.writes.push(writer.write_request_body(body, true));
            log.writes.push(writer.write_request_body(body, true));
        }
        if self.cancel_in == Some("write_body") {
            writer.cancel_request();
        }
    }

    fn read_ready(&mut self, reader: &mut ResponseReader<'_, '_>, status: u16) {
        let mut log = self.log.borrow_mut();
        log.events.push("read_ready");
        log.statuses.push(status);
        if self.cancel_in == Some("read_ready") {
            reader.cancel_response();
            return;
        }
        if self.read_chunk > 0 {
            let mut chunk = vec![0u8; self.read_chunk];
            match reader.read_response_body(&mut chunk) {
                Ok(n) => log.body.extend_from_slice(&chunk[..n]),
                Err(e) => log.errors.push(e),
            }
        }
    }

    fn error(&mut self, error: Error) {
        let mut log = self.log.borrow_mut();
        log.events.push("error");
        log.errors.push(error);
    }

    fn response_complete(&mut self, _response: &Response<'_>, outcome: Result<(), Error>) {
        let mut log = self.log.borrow_mut();
        log.events.push("response_complete");
        log.outcomes.push(outcome);
    }
}

fn async_get(path: &'static str) -> RequestInfo<'static> {
    RequestInfo {
        is_async: true,
        ..RequestInfo::get(path, "example.com")
    }
}

#[test]
fn test_callbacks_run_in_order() {
    let server = MockServer::fixed(response(200, &[], b"abcdef"));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    handler.read_chunk = 4;
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/data"))
        .unwrap();
    let response = Response::new(&mut head_buf, None).unwrap();

    let id = conn.send_async(request, response, &mut handler).unwrap();
    // Nothing happens until the scheduler runs the queue.
    assert!(server.state().written.is_empty());

    let done = conn.run_once().unwrap();
    assert_eq!(done.id, id);
    assert_eq!(done.state, AsyncState::Complete);
    assert_eq!(done.outcome, Ok(()));
    assert_eq!(done.response.status(), Ok(200));
    assert!(conn.run_once().is_none());

    let log = log.borrow();
    assert_eq!(
        log.events,
        vec![
            "append_header",
            "write_body",
            "read_ready",
            "read_ready",
            "response_complete"
        ]
    );
    assert_eq!(log.statuses, vec![200, 200]);
    assert_eq!(log.body, b"abcdef");
}

#[test]
fn test_cancel_in_append_header_sends_nothing() {
    let server = MockServer::fixed(response(200, &[], b""));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    handler.cancel_in = Some("append_header");
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/"))
        .unwrap();
    let response = Response::new(&mut head_buf, None).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    assert_eq!(done.state, AsyncState::Cancelled);
    assert_eq!(done.outcome, Err(Error::SendAborted));
    assert!(server.state().written.is_empty());
    assert_eq!(server.state().connects, 0);
    assert_eq!(conn.statistics().cancelled, 1);
    assert_eq!(
        log.borrow().events,
        vec!["append_header", "response_complete"]
    );
}

#[test]
fn test_header_added_in_callback_and_single_body_write() {
    let server = MockServer::fixed(response(201, &[], b""));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    handler.header = Some(("Content-Type", "application/octet-stream"));
    handler.body = Some(b"payload");
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 256];
    let mut head_buf = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let info = RequestInfo {
        method: Method::Put,
        ..async_get("/upload")
    };
    let request = client.initialize_request(&mut req_buf, &info).unwrap();
    let response = Response::new(&mut head_buf, None).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    assert_eq!(done.state, AsyncState::Complete);
    assert_eq!(done.response.status(), Ok(201));
    assert_eq!(
        log.borrow().writes,
        vec![
            Err(Error::NotSupported),
            Ok(()),
            Err(Error::MessageFinished)
        ]
    );
    let sent = server.request_text(0);
    assert!(sent.starts_with("PUT /upload HTTP/1.1\r\n"));
    assert!(sent.ends_with(
        "Content-Type: application/octet-stream\r\nConnection: keep-alive\r\nContent-Length: 7\r\n\r\npayload"
    ));
}

#[test]
fn test_unread_body_fills_response_buffer() {
    let server = MockServer::fixed(response(200, &[], b"abcdef"));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];
    let mut body_buf = [0u8; 4];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/"))
        .unwrap();
    let response = Response::new(&mut head_buf, Some(&mut body_buf)).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    assert_eq!(done.state, AsyncState::Complete);
    assert_eq!(done.outcome, Err(Error::MessageTooLarge));
    assert_eq!(done.response.body(), b"abcd");
    assert_eq!(conn.state(), State::Connected);
    assert_eq!(log.borrow().events.len(), 4);
}

#[test]
fn test_cancel_response_closes_session() {
    let server = MockServer::fixed(response(200, &[], b"abcdef"));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    handler.cancel_in = Some("read_ready");
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/"))
        .unwrap();
    let response = Response::new(&mut head_buf, None).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    assert_eq!(done.state, AsyncState::Cancelled);
    assert_eq!(done.outcome, Err(Error::ReceiveAborted));
    assert!(!conn.is_connected());
    assert_eq!(server.state().closes, 1);
}

#[test]
fn test_network_failure_reports_error_then_completion() {
    let server = MockServer::new(|_| Reply::Drop);
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/"))
        .unwrap();
    let response = Response::new(&mut head_buf, None).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    assert_eq!(done.state, AsyncState::Failed);
    assert_eq!(done.outcome, Err(Error::NetworkError));
    assert_eq!(conn.state(), State::Disconnected);

    let log = log.borrow();
    assert_eq!(
        log.events,
        vec!["append_header", "write_body", "error", "response_complete"]
    );
    assert_eq!(log.errors, vec![Error::NetworkError]);
}

#[test]
fn test_queue_full_hands_everything_back() {
    let server = MockServer::fixed(response(200, &[], b""));
    let log = RefCell::new(Log::default());
    let mut handlers: Vec<Recorder> = (0..=ASYNC_QUEUE_DEPTH)
        .map(|_| Recorder::new(&log))
        .collect();
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_bufs = [[0u8; 128]; ASYNC_QUEUE_DEPTH + 1];
    let mut head_bufs = [[0u8; 128]; ASYNC_QUEUE_DEPTH + 1];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();

    let mut results = Vec::new();
    for ((req_buf, head_buf), handler) in req_bufs
        .iter_mut()
        .zip(head_bufs.iter_mut())
        .zip(handlers.iter_mut())
    {
        let request = client
            .initialize_request(req_buf, &async_get("/queued"))
            .unwrap();
        let response = Response::new(head_buf, None).unwrap();
        results.push(conn.send_async(request, response, handler));
    }

    let rejected = results.pop().unwrap().unwrap_err();
    assert_eq!(rejected.error, Error::QueueFull);
    assert_eq!(rejected.request.header("Host"), Some("example.com"));
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(conn.pending(), ASYNC_QUEUE_DEPTH);
    assert_eq!(conn.statistics().rejected, 1);

    assert_eq!(conn.run_pending(), ASYNC_QUEUE_DEPTH);
    assert_eq!(server.state().requests.len(), ASYNC_QUEUE_DEPTH);
    assert_eq!(log.borrow().outcomes.len(), ASYNC_QUEUE_DEPTH);
}

#[test]
fn test_cancel_queued_job_by_id() {
    let server = MockServer::fixed(response(200, &[], b""));
    let log = RefCell::new(Log::default());
    let mut first = Recorder::new(&log);
    let mut second = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_a = [0u8; 128];
    let mut req_b = [0u8; 128];
    let mut head_a = [0u8; 128];
    let mut head_b = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let a = conn
        .send_async(
            client.initialize_request(&mut req_a, &async_get("/a")).unwrap(),
            Response::new(&mut head_a, None).unwrap(),
            &mut first,
        )
        .unwrap();
    let b = conn
        .send_async(
            client.initialize_request(&mut req_b, &async_get("/b")).unwrap(),
            Response::new(&mut head_b, None).unwrap(),
            &mut second,
        )
        .unwrap();

    conn.cancel_request_async(a).unwrap();
    assert_eq!(conn.run_pending(), 2);

    let done_a = conn.take_completion().unwrap();
    assert_eq!(done_a.id, a);
    assert_eq!(done_a.outcome, Err(Error::SendAborted));
    let done_b = conn.take_completion().unwrap();
    assert_eq!(done_b.id, b);
    assert_eq!(done_b.state, AsyncState::Complete);

    assert_eq!(server.state().requests.len(), 1);
    assert!(server.request_text(0).starts_with("GET /b "));
    assert_eq!(conn.cancel_response_async(b), Err(Error::NotFound));
}

#[test]
fn test_sync_send_runs_queued_jobs_first() {
    let server = MockServer::fixed(response(200, &[], b""));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_async = [0u8; 128];
    let mut req_sync = [0u8; 128];
    let mut head_async = [0u8; 128];
    let mut head_sync = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let id = conn
        .send_async(
            client
                .initialize_request(&mut req_async, &async_get("/first"))
                .unwrap(),
            Response::new(&mut head_async, None).unwrap(),
            &mut handler,
        )
        .unwrap();

    let request = client
        .initialize_request(&mut req_sync, &RequestInfo::get("/second", "example.com"))
        .unwrap();
    let mut response = Response::new(&mut head_sync, None).unwrap();
    conn.send_sync(&request, &mut response, 0).unwrap();

    assert!(server.request_text(0).starts_with("GET /first "));
    assert!(server.request_text(1).starts_with("GET /second "));
    assert_eq!(conn.take_completion().map(|c| c.id), Some(id));
}

#[test]
fn test_completion_resources_can_be_resubmitted() {
    let server = MockServer::fixed(response(200, &[], b"xy"));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];
    let mut body_buf = [0u8; 8];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/"))
        .unwrap();
    let response = Response::new(&mut head_buf, Some(&mut body_buf)).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    conn.send_async(done.request, done.response, done.handler)
        .unwrap();
    let again = conn.run_once().unwrap();

    assert_eq!(again.outcome, Ok(()));
    assert_eq!(again.response.body(), b"xy");
    assert_eq!(server.state().requests.len(), 2);
    assert_eq!(log.borrow().outcomes, vec![Ok(()), Ok(())]);
}

#[test]
fn test_sync_request_is_rejected() {
    let server = MockServer::fixed(response(200, &[], b""));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &RequestInfo::get("/", "example.com"))
        .unwrap();
    let response = Response::new(&mut head_buf, None).unwrap();

    let rejected = conn.send_async(request, response, &mut handler).unwrap_err();
    assert_eq!(rejected.error, Error::InvalidParameter);
    assert_eq!(conn.pending(), 0);
    assert!(log.borrow().events.is_empty());
}

#[test]
fn test_resubmitted_job_does_not_report_previous_response() {
    let mut replies = vec![Reply::Close(response(200, &[], b"xy"))].into_iter();
    let server = MockServer::new(move |_| replies.next().unwrap_or(Reply::Drop));
    let log = RefCell::new(Log::default());
    let mut handler = Recorder::new(&log);
    let client = Client::default();
    let mut conn_buf = [0u8; 256];
    let mut req_buf = [0u8; 128];
    let mut head_buf = [0u8; 128];
    let mut body_buf = [0u8; 8];

    let mut conn = client
        .connection(
            server.network(),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &async_get("/"))
        .unwrap();
    let response = Response::new(&mut head_buf, Some(&mut body_buf)).unwrap();
    conn.send_async(request, response, &mut handler).unwrap();

    let done = conn.run_once().unwrap();
    assert_eq!(done.response.status(), Ok(200));
    conn.send_async(done.request, done.response, done.handler)
        .unwrap();
    let again = conn.run_once().unwrap();

    assert_eq!(again.state, AsyncState::Failed);
    assert_eq!(again.outcome, Err(Error::NetworkError));
    assert_eq!(again.response.status(), Err(Error::NotFound));
    assert!(again.response.body().is_empty());
    assert_eq!(log.borrow().outcomes, vec![Ok(()), Err(Error::NetworkError)]);
}
