// src/health/tcp.rs
use super::checker::{CheckError, Checker};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Dials `address` and hangs up as soon as the connection is established.
#[derive(Debug, Clone)]
pub struct TcpChecker {
    address: String,
    timeout: Duration,
}

impl TcpChecker {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Checker for TcpChecker {
    async fn probe(&self) -> Result<(), CheckError> {
        // Name resolution happens inside connect, so the deadline covers DNS too.
        match timeout(self.timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "tcp dial failed");
                Err(CheckError::ConnectionFailed {
                    address: self.address.clone(),
                })
            }
            Err(_) => {
                debug!(address = %self.address, timeout = ?self.timeout, "tcp dial timed out");
                Err(CheckError::ConnectionFailed {
                    address: self.address.clone(),
                })
            }
        }
    }

    fn kind(&self) -> &'static str {
        "tcp"
    }
}
