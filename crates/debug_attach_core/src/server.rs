use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::config::MAX_REQUEST_BYTES;
use crate::error::ErrorCode;
use crate::service::AttachService;
use crate::types::{AttachRequest, AttachResponse};
use crate::{AttachError, Result};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Loopback listener answering one attach request per connection.
pub struct RequestServer {
    listener: TcpListener,
    service: Arc<AttachService>,
}

impl RequestServer {
    /// Binds `127.0.0.1:<port>` from the service configuration.
    pub async fn bind(service: Arc<AttachService>) -> Result<Self> {
        let port = service.config().port;
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|source| AttachError::Bind { port, source })?;

        tracing::info!("Debug attach service listening on {}", listener.local_addr()?);
        Ok(Self { listener, service })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` resolves, then waits for in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Accepted connection from {}", peer);
                        let service = Arc::clone(&self.service);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, service).await {
                                tracing::warn!("Connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        if !accept_backoff(shutdown.as_mut()).await {
                            tracing::info!("Shutdown requested, no longer accepting connections");
                            break;
                        }
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Connection task aborted: {}", e);
                    }
                }
            }
        }

        drop(self.listener);
        if !connections.is_empty() {
            tracing::info!("Waiting for {} in-flight request(s)", connections.len());
        }
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Connection task aborted: {}", e);
            }
        }

        tracing::info!("Debug attach service stopped");
        Ok(())
    }
}

/// Waits out the accept backoff. Returns `false` if `shutdown` resolved first.
async fn accept_backoff<F>(shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = shutdown => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}

async fn handle_connection(stream: TcpStream, service: Arc<AttachService>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));

    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;

    let response = match decode_request(&line) {
        Ok(request) => run_pipeline(service, request).await,
        Err(response) => {
            tracing::warn!(
                "Rejected request: {}",
                response.message.as_deref().unwrap_or_default()
            );
            response
        }
    };

    let mut payload = serde_json::to_vec(&response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Decodes one request line, or produces the rejection to send back.
pub fn decode_request(line: &[u8]) -> std::result::Result<AttachRequest, AttachResponse> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Err(AttachResponse::failure(
            ErrorCode::NullRequest,
            "Request is empty or null",
        ));
    }

    serde_json::from_str(text).map_err(|e| {
        AttachResponse::failure(ErrorCode::InvalidJson, format!("Invalid JSON: {e}"))
    })
}

/// Runs the attach pipeline in its own task so a panic turns into a response.
async fn run_pipeline(service: Arc<AttachService>, request: AttachRequest) -> AttachResponse {
    match tokio::spawn(async move { service.handle_request(request).await }).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Attach pipeline crashed: {}", e);
            AttachResponse::failure(ErrorCode::AttachFailed, "Internal error while attaching")
        }
    }
}
