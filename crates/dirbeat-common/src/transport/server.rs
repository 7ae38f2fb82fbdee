use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::protocol::error::{DirError, Result};
use crate::protocol::{DirRequest, DirResponse};
use crate::transport::codec::JsonCodec;

/// Maximum frame size accepted from a peer (16 MB)
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Async accept/dispatch loop for DIR-style requests.
///
/// Accepts connections and spawns a task per connection; each connection
/// serves multiple requests (keep-alive) until the peer closes it. The
/// handler receives decoded [`DirRequest`]s and produces [`DirResponse`]s.
pub struct RpcServer {
    listener: TcpListener,
}

impl RpcServer {
    /// Binds to the given address.
    pub async fn bind(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| DirError::Transport(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { listener })
    }

    /// The actual bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| DirError::Transport(format!("Failed to get local addr: {}", e)))
    }

    /// Runs the server with the given request handler.
    pub async fn run_with_handler<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(DirRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<DirResponse>> + Send + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            let (stream, peer_addr) = self.listener.accept().await.map_err(|e| {
                DirError::Transport(format!("Failed to accept connection: {}", e))
            })?;

            debug!(peer = %peer_addr, "connection established");

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection error");
                }
            });
        }
    }
}

/// Serves requests on one connection until the peer closes it.
async fn handle_connection<F, Fut>(mut stream: TcpStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(DirRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<DirResponse>> + Send + 'static,
{
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("connection closed by peer");
                return Ok(());
            }
            Err(e) => {
                return Err(DirError::Connection(format!("Failed to read length: {}", e)));
            }
        }

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
            .map_err(|e| DirError::Connection(format!("Failed to read data: {}", e)))?;

        let request = match JsonCodec::decode_request(&buf) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "failed to decode request");
                let error_response = DirResponse::error(0, e.to_string());
                send_response(&mut stream, &error_response).await?;
                continue;
            }
        };

        let request_id = request.id;
        let response = match handler(request).await {
            Ok(response) => response,
            Err(e) => DirResponse::error(request_id, e.to_string()),
        };

        send_response(&mut stream, &response).await?;
    }
}

async fn send_response(stream: &mut TcpStream, response: &DirResponse) -> Result<()> {
    let encoded = JsonCodec::encode_response(response)?;
    let len = encoded.len() as u32;

    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| DirError::Connection(format!("Failed to write length: {}", e)))?;
    stream
        .write_all(&encoded)
        .await
        .map_err(|e| DirError::Connection(format!("Failed to write data: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DirError::Connection(format!("Failed to flush: {}", e)))?;

    Ok(())
}
