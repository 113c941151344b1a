use std::hint::black_box;

use criterion::{Criterion, Throughput};
use libiot_https::network::application::http::{
    Client, ConnectionConfig, HeaderBuffer, RequestInfo, Response,
};
use libiot_https::network::error::Error;
use libiot_https::network::{Close, Connect, Connection, Endpoint, Read, Write};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Answers every read from a canned response, restarting it after each
/// request.
struct Replay {
    reply: Vec<u8>,
    pos: usize,
}

impl Read for Replay {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.reply.len() - self.pos);
        buf[..n].copy_from_slice(&self.reply[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for Replay {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.pos = 0;
        Ok(())
    }
}

impl Close for Replay {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for Replay {
    fn now_ms(&self) -> u64 {
        0
    }
}

struct ReplayNetwork(Vec<u8>);

impl Connect for ReplayNetwork {
    type Connection = Replay;
    type Error = Error;

    fn connect(&mut self, _endpoint: &Endpoint<'_>) -> Result<Replay, Error> {
        Ok(Replay {
            reply: self.0.clone(),
            pos: 0,
        })
    }
}

pub fn bench_request_format(c: &mut Criterion) {
    let client = Client::default();
    let info = RequestInfo::get(
        "/firmware/app-v2.bin?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Expires=3600",
        "my-bucket.s3.amazonaws.com",
    );
    let mut buf = [0u8; 512];

    c.bench_function("http_request_format", |b| {
        b.iter(|| {
            let mut request = client.initialize_request(&mut buf, black_box(&info)).unwrap();
            request.add_header("Range", "bytes=0-4095").unwrap();
            request.add_header("Accept", "*/*").unwrap();
            black_box(request.headers().len());
        })
    });
}

pub fn bench_header_lookup(c: &mut Criterion) {
    let mut raw = [0u8; 1024];
    let mut headers = HeaderBuffer::new(&mut raw);
    headers.push_truncated(b"HTTP/1.1 206 Partial Content\r\n");
    for i in 0..12 {
        let line = format!("X-Amz-Meta-Field-{}: value-{}\r\n", i, i);
        headers.push_truncated(line.as_bytes());
    }
    headers.push_truncated(b"Content-Range: bytes 0-4095/1048576\r\nContent-Length: 4096\r\n\r\n");

    c.bench_function("http_header_lookup", |b| {
        b.iter(|| {
            black_box(headers.value(black_box("content-range")));
            black_box(headers.content_length());
        })
    });
}

pub fn bench_sync_exchange(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut body = vec![0u8; 4096];
    rng.fill(&mut body[..]);
    let mut reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    reply.extend_from_slice(&body);

    let client = Client::default();
    let mut conn_buf = [0u8; 1024];
    let mut req_buf = [0u8; 256];
    let mut head_buf = [0u8; 256];
    let mut body_buf = vec![0u8; 4096];
    let mut conn = client
        .connect(
            ReplayNetwork(reply),
            ConnectionConfig::new("example.com", 443),
            &mut conn_buf,
        )
        .unwrap();
    let request = client
        .initialize_request(&mut req_buf, &RequestInfo::get("/blob", "example.com"))
        .unwrap();
    let mut response = Response::new(&mut head_buf, Some(body_buf.as_mut_slice())).unwrap();

    let mut group = c.benchmark_group("http_sync_exchange");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("4k_body", |b| {
        b.iter(|| {
            conn.send_sync(&request, &mut response, 0).unwrap();
            black_box(response.body().len());
        })
    });
    group.finish();
}
