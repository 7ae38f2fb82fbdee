use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;

use dirbeat_common::protocol::error::{DirError, Result};
use dirbeat_common::transport::DirTransport;

/// Connection pool configuration.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of idle connections kept around
    pub max_idle: usize,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 4,
            connect_timeout_ms: 5000,
        }
    }
}

/// Idle-connection pool for a single DIR peer.
///
/// Connections are handed out LIFO and returned after a successful request.
/// A connection that saw an error is dropped rather than returned, so the
/// pool never recycles a stream in an unknown framing state.
pub struct ConnectionPool {
    addr: String,
    transport: DirTransport,
    idle: Mutex<Vec<TcpStream>>,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(addr: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            addr: addr.into(),
            transport: DirTransport::new(),
            idle: Mutex::new(Vec::new()),
            config,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Takes an idle connection or opens a new one.
    pub async fn acquire(&self) -> Result<TcpStream> {
        if let Some(stream) = self.idle.lock().await.pop() {
            return Ok(stream);
        }

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        tokio::time::timeout(timeout, self.transport.connect(&self.addr))
            .await
            .map_err(|_| DirError::Timeout(self.config.connect_timeout_ms))?
    }

    /// Returns a healthy connection to the pool. Dropped if the pool is full.
    pub async fn release(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.config.max_idle {
            idle.push(stream);
        }
    }

    /// Drops all idle connections.
    pub async fn drain(&self) {
        self.idle.lock().await.clear();
    }
}
