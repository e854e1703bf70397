//! Wait-time API client
//!
//! `GET {base_url}/v1/waitingtimes` with `park` and `language` headers.
//! The response is a JSON array of `{code, name, waitingtime, status}`.

use crate::domain::attraction::AttractionWaitTime;
use crate::infra::config::Config;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Log fetch failure (cold path)
#[cold]
fn log_fetch_failed(url: &str, e: &SourceError) {
    error!(url = %url, error = %e, "waittimes_fetch_failed");
}

/// Remote source of the current wait-time list
#[async_trait]
pub trait WaitTimeSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<AttractionWaitTime>, SourceError>;
}

/// reqwest-backed source
pub struct HttpWaitTimeSource {
    client: reqwest::Client,
    url: String,
    park: String,
    language: String,
}

impl HttpWaitTimeSource {
    pub fn new(url: &str, park: &str, language: &str, timeout: Duration) -> Result<Self, SourceError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("waitwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            park: park.to_string(),
            language: language.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Self::new(&config.waittimes_url(), config.api_park(), config.api_language(), config.api_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_inner(&self) -> Result<Vec<AttractionWaitTime>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .header("park", &self.park)
            .header("language", &self.language)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let items: Vec<AttractionWaitTime> = serde_json::from_slice(&body)?;
        debug!(url = %self.url, bytes = %body.len(), count = %items.len(), "waittimes_response");
        Ok(items)
    }
}

#[async_trait]
impl WaitTimeSource for HttpWaitTimeSource {
    async fn fetch(&self) -> Result<Vec<AttractionWaitTime>, SourceError> {
        let result = self.fetch_inner().await;
        if let Err(ref e) = result {
            log_fetch_failed(&self.url, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned HTTP response; hands back the raw request head
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
        });

        (format!("http://{}/v1/waitingtimes", addr), rx)
    }

    #[tokio::test]
    async fn test_fetch_decodes_and_sends_headers() {
        let body = r#"[{"code":"34","name":"Taron","waitingtime":80,"status":"opened"}]"#;
        let (url, request_rx) = serve_once("200 OK", body).await;

        let source = HttpWaitTimeSource::new(&url, "phantasialand", "de", Duration::from_secs(5)).unwrap();
        let items = source.fetch().await.unwrap();
        assert_eq!(items, vec![AttractionWaitTime::new("34", "Taron", 80, "opened")]);

        let request = request_rx.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /v1/waitingtimes"));
        assert!(request.contains("park: phantasialand"));
        assert!(request.contains("language: de"));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let (url, _rx) = serve_once("503 Service Unavailable", "[]").await;
        let source = HttpWaitTimeSource::new(&url, "phantasialand", "de", Duration::from_secs(5)).unwrap();
        match source.fetch().await {
            Err(SourceError::Status(code)) => assert_eq!(code, 503),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let (url, _rx) = serve_once("200 OK", r#"{"not":"a list"}"#).await;
        let source = HttpWaitTimeSource::new(&url, "phantasialand", "de", Duration::from_secs(5)).unwrap();
        assert!(matches!(source.fetch().await, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without ever answering
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let url = format!("http://{}/v1/waitingtimes", addr);
        let source = HttpWaitTimeSource::new(&url, "phantasialand", "de", Duration::from_millis(200)).unwrap();
        match source.fetch().await {
            Err(SourceError::Request(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let url = format!("http://{}/v1/waitingtimes", addr);
        let source = HttpWaitTimeSource::new(&url, "phantasialand", "de", Duration::from_secs(2)).unwrap();
        assert!(matches!(source.fetch().await, Err(SourceError::Request(_))));
    }
}
