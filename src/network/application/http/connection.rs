//! Connection manager: one transport session, its receive staging buffer and
//! its busy/idle state.

use heapless::Deque;
use serde::Deserialize;

use super::asynchronous::{Completion, Job};
use super::client::Client;
use super::error::Error;
use crate::network::{
    self, Close as _, Connect, Endpoint, ErrorKind as _, Read as _, TlsConfig, Write as _,
};

/// Smallest connection buffer accepted when creating a connection.
pub const CONNECTION_BUFFER_MIN_SIZE: usize = 64;

/// Time limit for asynchronous exchanges when the configuration leaves
/// `timeout_ms` at zero.
pub const DEFAULT_RESPONSE_WAIT_MS: u32 = 1000;

/// Asynchronous operations that can be queued on one connection.
pub const ASYNC_QUEUE_DEPTH: usize = 4;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No transport session.
    Disconnected,
    /// The transport is opening a session.
    Connecting,
    /// Idle session, ready for an exchange.
    Connected,
    /// An exchange is in flight on the session.
    Busy,
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, f: defmt::Formatter) {
        match self {
            State::Disconnected => defmt::write!(f, "Disconnected"),
            State::Connecting => defmt::write!(f, "Connecting"),
            State::Connected => defmt::write!(f, "Connected"),
            State::Busy => defmt::write!(f, "Busy"),
        }
    }
}

/// Credential material handed to the transport for the TLS handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Credentials<'a> {
    /// Trusted server root certificate.
    pub ca_cert: Option<&'a [u8]>,
    /// Client certificate.
    pub client_cert: Option<&'a [u8]>,
    /// Client private key.
    pub private_key: Option<&'a [u8]>,
    /// Comma separated ALPN protocols.
    pub alpn: Option<&'a str>,
}

fn enabled() -> bool {
    true
}

/// Where and how to connect.
///
/// The non-secret fields can be loaded from a JSON device configuration with
/// [`ConnectionConfig::from_json`]; credentials are always set in code.
///
/// ```rust
/// use libiot_https::network::application::http::ConnectionConfig;
///
/// let config = ConnectionConfig::from_json(
///     br#"{"address":"my-bucket.s3.amazonaws.com","port":443,"timeout_ms":5000}"#,
/// )
/// .unwrap();
/// assert_eq!(config.port, 443);
/// assert!(config.tls);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig<'a> {
    /// DNS name or IP address of the server.
    pub address: &'a str,
    /// Remote port.
    pub port: u16,
    /// Open the session over TLS.
    #[serde(default = "enabled")]
    pub tls: bool,
    /// Send Server Name Indication during the handshake.
    #[serde(default = "enabled")]
    pub sni: bool,
    /// Time limit for each asynchronous exchange, `0` for
    /// [`DEFAULT_RESPONSE_WAIT_MS`].
    #[serde(default)]
    pub timeout_ms: u32,
    /// TLS credentials.
    #[serde(skip)]
    pub credentials: Credentials<'a>,
}

impl<'a> ConnectionConfig<'a> {
    /// A TLS configuration with default settings and no credentials.
    pub fn new(address: &'a str, port: u16) -> Self {
        Self {
            address,
            port,
            tls: true,
            sni: true,
            timeout_ms: 0,
            credentials: Credentials::default(),
        }
    }

    /// Parses the non-secret fields from a JSON object, borrowing strings
    /// from `json`.
    pub fn from_json(json: &'a [u8]) -> Result<Self, Error> {
        let (config, _) = serde_json_core::from_slice::<ConnectionConfig<'a>>(json)
            .map_err(|_| Error::InvalidParameter)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.address.is_empty() || self.port == 0 {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    /// The time limit applied to asynchronous exchanges.
    pub fn response_wait_ms(&self) -> u32 {
        if self.timeout_ms == 0 {
            DEFAULT_RESPONSE_WAIT_MS
        } else {
            self.timeout_ms
        }
    }

    fn endpoint(&self) -> Endpoint<'a> {
        let tls = self.tls.then_some(TlsConfig {
            ca_cert: self.credentials.ca_cert,
            client_cert: self.credentials.client_cert,
            private_key: self.credentials.private_key,
            alpn: self.credentials.alpn,
            sni: self.sni,
        });
        Endpoint {
            address: self.address,
            port: self.port,
            tls,
        }
    }
}

/// Counters kept per connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Requests fully placed on the wire.
    pub requests_sent: u32,
    /// Response header blocks received.
    pub responses_received: u32,
    /// Response header bytes dropped because the header buffer was full.
    pub header_bytes_discarded: u32,
    /// Response body bytes read and dropped.
    pub body_bytes_discarded: u32,
    /// Transport failures.
    pub network_errors: u32,
    /// Asynchronous operations that ended cancelled.
    pub cancelled: u32,
    /// Asynchronous operations refused at scheduling time.
    pub rejected: u32,
}

// Counters saturate on long-lived connections.
impl Statistics {
    pub(crate) fn discard_body(&mut self, bytes: usize) {
        let bytes = u32::try_from(bytes).unwrap_or(u32::MAX);
        self.body_bytes_discarded = self.body_bytes_discarded.saturating_add(bytes);
    }

    pub(crate) fn discard_header(&mut self, bytes: usize) {
        let bytes = u32::try_from(bytes).unwrap_or(u32::MAX);
        self.header_bytes_discarded = self.header_bytes_discarded.saturating_add(bytes);
    }
}

/// Byte-level access to an open session, as seen by the protocol steps and
/// by the asynchronous callback contexts.
pub(crate) trait Wire {
    /// Writes all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error>;
    fn flush(&mut self) -> Result<(), Error>;
    /// Pending received bytes, reading from the transport when there are
    /// none. An empty slice means the peer closed the stream.
    fn fill(&mut self) -> Result<&[u8], Error>;
    /// Marks `n` bytes returned by [`fill`](Wire::fill) as used.
    fn consume(&mut self, n: usize);
}

/// The transport session plus the caller's connection buffer, used as the
/// receive staging area. `scratch[start..end]` holds bytes received but not
/// consumed yet.
pub(crate) struct Link<'a, C> {
    session: Option<C>,
    scratch: &'a mut [u8],
    start: usize,
    end: usize,
    /// Clock reading after which receives fail with `TimeoutError`.
    deadline: Option<u64>,
}

impl<'a, C: network::Connection> Link<'a, C> {
    fn new(scratch: &'a mut [u8]) -> Self {
        Self {
            session: None,
            scratch,
            start: 0,
            end: 0,
            deadline: None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn attach(&mut self, session: C) {
        self.session = Some(session);
        self.discard_pending();
    }

    /// Drops received bytes left over from a previous exchange.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let dropped = self.end - self.start;
        self.start = 0;
        self.end = 0;
        dropped
    }

    pub(crate) fn set_timeout(&mut self, timeout_ms: u32) {
        if let Some(session) = self.session.as_mut() {
            session.set_timeout(timeout_ms);
        }
    }

    /// Bounds all receives until [`disarm`](Link::disarm) by one deadline
    /// `timeout_ms` from now. `0` leaves the exchange unbounded.
    pub(crate) fn arm(&mut self, timeout_ms: u32) {
        self.deadline = match self.session.as_ref() {
            Some(session) if timeout_ms > 0 => {
                Some(session.now_ms().saturating_add(u64::from(timeout_ms)))
            }
            _ => None,
        };
        self.set_timeout(timeout_ms);
    }

    pub(crate) fn disarm(&mut self, timeout_ms: u32) {
        self.deadline = None;
        self.set_timeout(timeout_ms);
    }

    /// Closes the session. Close failures are irrelevant at this point.
    pub(crate) fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close() {
                debug!("close failed: {}", e.kind());
            }
        }
        self.discard_pending();
    }
}

impl<C: network::Connection> Wire for Link<'_, C> {
    fn send(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NetworkError)?;
        while !bytes.is_empty() {
            match session.write(bytes) {
                Ok(0) => {
                    self.close();
                    return Err(Error::NetworkError);
                }
                Ok(n) => bytes = &bytes[n.min(bytes.len())..],
                Err(e) => {
                    let kind = e.kind();
                    warn!("send failed: {}", kind);
                    self.close();
                    return Err(Error::from_transport(kind));
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NetworkError)?;
        if let Err(e) = session.flush() {
            let kind = e.kind();
            warn!("flush failed: {}", kind);
            self.close();
            return Err(Error::from_transport(kind));
        }
        Ok(())
    }

    fn fill(&mut self) -> Result<&[u8], Error> {
        if self.start == self.end {
            let session = self.session.as_mut().ok_or(Error::NetworkError)?;
            if let Some(deadline) = self.deadline {
                let now = session.now_ms();
                if now >= deadline {
                    warn!("exchange deadline passed");
                    self.close();
                    return Err(Error::TimeoutError);
                }
                session.set_timeout(u32::try_from(deadline - now).unwrap_or(u32::MAX));
            }
            let session = self.session.as_mut().ok_or(Error::NetworkError)?;
            match session.read(self.scratch) {
                Ok(0) => {
                    debug!("peer closed the session");
                    self.close();
                }
                Ok(n) => {
                    self.start = 0;
                    self.end = n.min(self.scratch.len());
                }
                Err(e) => {
                    let kind = e.kind();
                    warn!("receive failed: {}", kind);
                    self.close();
                    return Err(Error::from_transport(kind));
                }
            }
        }
        Ok(&self.scratch[self.start..self.end])
    }

    fn consume(&mut self, n: usize) {
        self.start = (self.start + n).min(self.end);
    }
}

/// One transport session to one server.
///
/// Only one exchange uses the session at a time: synchronous sends borrow the
/// connection mutably for their whole duration, and asynchronous sends are
/// queued and driven one after the other by [`run_once`](Connection::run_once).
pub struct Connection<'a, N: Connect> {
    pub(crate) client: &'a Client,
    network: N,
    pub(crate) config: ConnectionConfig<'a>,
    pub(crate) link: Link<'a, N::Connection>,
    pub(crate) state: State,
    pub(crate) queue: Deque<Job<'a>, ASYNC_QUEUE_DEPTH>,
    pub(crate) completed: Deque<Completion<'a>, ASYNC_QUEUE_DEPTH>,
    pub(crate) stats: Statistics,
}

impl<'a, N: Connect> Connection<'a, N> {
    pub(crate) fn new(
        client: &'a Client,
        network: N,
        config: ConnectionConfig<'a>,
        buffer: &'a mut [u8],
    ) -> Result<Self, Error> {
        config.validate()?;
        if buffer.len() < CONNECTION_BUFFER_MIN_SIZE {
            return Err(Error::InsufficientMemory);
        }
        Ok(Self {
            client,
            network,
            config,
            link: Link::new(buffer),
            state: State::Disconnected,
            queue: Deque::new(),
            completed: Deque::new(),
            stats: Statistics::default(),
        })
    }

    /// Opens the transport session. An open session is closed first and
    /// replaced.
    pub fn connect(&mut self) -> Result<(), Error> {
        if self.link.is_open() {
            self.link.close();
        }
        self.state = State::Connecting;
        info!("connecting to {}:{}", self.config.address, self.config.port);
        match self.network.connect(&self.config.endpoint()) {
            Ok(session) => {
                self.link.attach(session);
                self.link.set_timeout(self.config.response_wait_ms());
                self.state = State::Connected;
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                error!("connect to {} failed: {}", self.config.address, kind);
                self.state = State::Disconnected;
                Err(Error::from_connect(kind))
            }
        }
    }

    /// Closes the transport session.
    ///
    /// Refused with `Busy` while asynchronous operations are queued. Calling
    /// it on a disconnected connection succeeds and does nothing.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        if self.state == State::Busy || !self.queue.is_empty() {
            return Err(Error::Busy);
        }
        if self.link.is_open() {
            info!("disconnecting from {}", self.config.address);
            self.link.close();
        }
        self.state = State::Disconnected;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// `true` while a transport session is open.
    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    /// The configuration the connection was created with.
    pub fn config(&self) -> &ConnectionConfig<'a> {
        &self.config
    }

    /// Counters since the connection was created.
    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Number of asynchronous operations waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.link.is_open() {
            return Ok(());
        }
        self.connect()
    }

    /// Starts an exchange on the open session. Every receive of the exchange
    /// must complete within `timeout_ms` of this call, `0` meaning no limit.
    pub(crate) fn begin_exchange(&mut self, timeout_ms: u32) {
        self.state = State::Busy;
        let stale = self.link.discard_pending();
        self.stats.discard_body(stale);
        self.link.arm(timeout_ms);
    }

    /// Ends an exchange. A session whose byte stream is no longer aligned on
    /// a message boundary is closed, and so is the session of a
    /// non-persistent request.
    pub(crate) fn end_exchange(
        &mut self,
        failure: Option<Error>,
        in_sync: bool,
        keep_alive: bool,
    ) {
        if failure.is_some_and(|e| e.is_retryable()) {
            self.stats.network_errors = self.stats.network_errors.saturating_add(1);
        }
        if (!in_sync || !keep_alive) && self.link.is_open() {
            self.link.close();
        }
        self.link.disarm(self.config.response_wait_ms());
        self.state = if self.link.is_open() {
            State::Connected
        } else {
            State::Disconnected
        };
    }
}

impl<N: Connect> core::fmt::Debug for Connection<'_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending", &self.queue.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
