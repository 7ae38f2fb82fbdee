//! DIR Liveness Waiter
//!
//! Node bring-up calls [`wait_for_dir`] before constructing any component
//! that talks to DIR, so a node booting in parallel with its directory does
//! not fail its startup registration.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{info, warn};

use dirbeat_common::protocol::error::{DirError, Result};

/// Per-attempt connect timeout.
pub const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Blocks until a TCP connection to the DIR at `addr` succeeds.
///
/// Failed attempts back off linearly: the sleep before attempt `k+1` is `k`
/// seconds. A name-resolution failure aborts immediately; a connection
/// failure retries until the total elapsed time reaches `max_wait`, which
/// yields [`DirError::DirUnreachable`] naming the address.
pub async fn wait_for_dir(addr: &str, max_wait: Duration) -> Result<()> {
    let start = Instant::now();
    let mut wait_s: u64 = 1;

    loop {
        let socket_addrs: Vec<SocketAddr> = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| {
                DirError::Connection(format!("cannot resolve DIR address '{}': {}", addr, e))
            })?
            .collect();
        if socket_addrs.is_empty() {
            return Err(DirError::Connection(format!(
                "cannot resolve DIR address '{}'",
                addr
            )));
        }

        match try_connect(&socket_addrs).await {
            Ok(()) => {
                info!(dir = %addr, "DIR is reachable");
                return Ok(());
            }
            Err(e) => {
                warn!(dir = %addr, error = %e, wait_s, "cannot connect to DIR, waiting");
            }
        }

        if start.elapsed() >= max_wait {
            return Err(DirError::DirUnreachable(addr.to_string()));
        }

        tokio::time::sleep(Duration::from_secs(wait_s)).await;
        wait_s += 1;
    }
}

async fn try_connect(addrs: &[SocketAddr]) -> Result<()> {
    let mut last_err = None;
    for addr in addrs {
        match tokio::time::timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => return Ok(()),
            Ok(Err(e)) => last_err = Some(DirError::Io(e)),
            Err(_) => {
                last_err = Some(DirError::Timeout(CONNECT_ATTEMPT_TIMEOUT.as_millis() as u64))
            }
        }
    }
    Err(last_err.unwrap_or_else(|| DirError::Connection("no addresses to try".to_string())))
}
