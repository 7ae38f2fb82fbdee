use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{DirError, Result};
use crate::protocol::{DirRequest, DirResponse};
use crate::transport::codec::JsonCodec;

/// Default timeout for TCP operations (5 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frame size (16 MB). DIR entities are small; anything larger is a
/// corrupt length prefix.
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Async TCP transport for DIR calls.
///
/// # Wire Protocol
///
/// Messages are sent with a 4-byte length prefix (big-endian u32) followed
/// by the JSON-encoded envelope:
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
///
/// # Example
///
/// ```no_run
/// use dirbeat_common::transport::DirTransport;
/// use dirbeat_common::protocol::{DirRequest, UserCredentials};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = DirTransport::new();
/// let mut stream = transport.connect("127.0.0.1:32638").await?;
///
/// let request = DirRequest::new(
///     "service_get_by_uuid",
///     json!({"uuid": "u1"}),
///     UserCredentials::heartbeat(),
/// );
/// let response = transport.send_request(&mut stream, &request).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DirTransport;

impl DirTransport {
    pub fn new() -> Self {
        Self
    }

    /// Connects to a remote endpoint.
    ///
    /// The address may resolve to multiple socket addresses; each is tried
    /// in turn until one accepts the connection.
    pub async fn connect(&self, addr: &str) -> Result<TcpStream> {
        let socket_addrs = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| DirError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(&socket_addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(DirError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Sends a request and waits for the matching response.
    pub async fn send_request(
        &self,
        stream: &mut TcpStream,
        request: &DirRequest,
    ) -> Result<DirResponse> {
        let encoded = JsonCodec::encode_request(request)?;
        Self::send_message(stream, &encoded).await?;

        let response_data = Self::receive_message(stream).await?;
        let response = JsonCodec::decode_response(&response_data)?;

        Ok(response)
    }

    /// Sends one length-prefixed frame.
    pub async fn send_message(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        let len = data.len() as u32;

        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| Self::map_io_error(e, "writing length prefix"))?;

        stream
            .write_all(data)
            .await
            .map_err(|e| Self::map_io_error(e, "writing data"))?;

        stream
            .flush()
            .await
            .map_err(|e| Self::map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Receives one length-prefixed frame.
    pub async fn receive_message(stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(DirError::InvalidResponse(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading data"))?;

        Ok(buf)
    }

    /// Map IO errors to transport error variants: timeouts stay timeouts,
    /// lost peers become connection errors, the rest passes through.
    fn map_io_error(err: std::io::Error, context: &str) -> DirError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                DirError::Timeout(DEFAULT_TIMEOUT.as_millis() as u64)
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => {
                DirError::Connection(format!("{}: Connection lost", context))
            }
            _ => DirError::Io(err),
        }
    }
}
