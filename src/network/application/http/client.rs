//! The client engine instance.

use core::cell::Cell;

use super::asynchronous::JobId;
use super::connection::{Connection, ConnectionConfig};
use super::error::Error;
use super::request::{DEFAULT_USER_AGENT, Request, RequestInfo};
use crate::network::Connect;

/// Engine-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// `User-Agent` placed in every request this client initializes.
    pub user_agent: &'static str,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT,
        }
    }
}

/// An initialized HTTPS client.
///
/// Connections borrow the client, so it cannot be deinitialized while any of
/// them is alive.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    next_job: Cell<u32>,
}

impl Client {
    /// Initializes the engine.
    pub fn init(config: ClientConfig) -> Self {
        info!("http client initialized");
        Self {
            config,
            next_job: Cell::new(1),
        }
    }

    /// Tears the engine down.
    pub fn deinit(self) {
        info!("http client deinitialized");
    }

    /// Engine-wide settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Creates a disconnected connection. `buffer` becomes the receive
    /// staging area of the connection and must hold at least
    /// [`CONNECTION_BUFFER_MIN_SIZE`](super::CONNECTION_BUFFER_MIN_SIZE)
    /// bytes.
    pub fn connection<'a, N: Connect>(
        &'a self,
        network: N,
        config: ConnectionConfig<'a>,
        buffer: &'a mut [u8],
    ) -> Result<Connection<'a, N>, Error> {
        Connection::new(self, network, config, buffer)
    }

    /// Creates a connection and opens it.
    pub fn connect<'a, N: Connect>(
        &'a self,
        network: N,
        config: ConnectionConfig<'a>,
        buffer: &'a mut [u8],
    ) -> Result<Connection<'a, N>, Error> {
        let mut connection = self.connection(network, config, buffer)?;
        connection.connect()?;
        Ok(connection)
    }

    /// Formats a request into `buffer` with this client's user agent.
    pub fn initialize_request<'a>(
        &self,
        buffer: &'a mut [u8],
        info: &RequestInfo<'a>,
    ) -> Result<Request<'a>, Error> {
        Request::with_user_agent(buffer, info, self.config.user_agent)
    }

    pub(crate) fn next_job_id(&self) -> JobId {
        let id = self.next_job.get();
        self.next_job.set(id.wrapping_add(1));
        JobId(id)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::init(ClientConfig::default())
    }
}
