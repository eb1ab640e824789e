use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::DEFAULT_PORT;
use crate::types::{AttachRequest, AttachResponse};
use crate::{AttachError, Result};

/// Editor-side client: sends one request and waits for the single response line.
#[derive(Debug, Clone)]
pub struct AttachClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl AttachClient {
    pub fn new(port: u16) -> Self {
        Self::with_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port).into())
    }

    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            addr,
            // Covers the service's own retry and IDE readiness budgets.
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn request_attach(&self, request: &AttachRequest) -> Result<AttachResponse> {
        tracing::debug!(
            "Sending attach request: pid={}, editor={}",
            request.pid,
            request.editor
        );

        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| AttachError::Timeout(self.timeout))?
    }

    async fn exchange(&self, request: &AttachRequest) -> Result<AttachResponse> {
        let mut stream = TcpStream::connect(self.addr).await?;

        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');
        stream.write_all(&payload).await?;

        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).await?;
        if line.trim().is_empty() {
            return Err(AttachError::Protocol(
                "connection closed without a response".to_string(),
            ));
        }

        let response: AttachResponse = serde_json::from_str(line.trim_end())?;
        if response.success {
            tracing::debug!("Attach request accepted");
        } else {
            tracing::warn!(
                "Attach request failed: {:?} {}",
                response.error_code,
                response.message.as_deref().unwrap_or_default()
            );
        }
        Ok(response)
    }
}

impl Default for AttachClient {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}
