use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::application::ports::ImageFetchPort;
use crate::domain::errors::{DomainError, DomainResult};

/// Downloads images over HTTP(S). The whole request, body included, is bounded
/// by the client timeout.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }

    fn too_large(&self) -> DomainError {
        DomainError::FetchFailed(format!("image larger than {} bytes", self.max_bytes))
    }
}

#[async_trait]
impl ImageFetchPort for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> DomainResult<Vec<u8>> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| DomainError::FetchFailed(format!("invalid url {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DomainError::FetchFailed(format!("unsupported scheme {}", parsed.scheme())));
        }

        let mut res = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(%url, error = %e, "image fetch failed");
                DomainError::FetchFailed(e.to_string())
            })?;

        if res.content_length().is_some_and(|len| len > self.max_bytes as u64) {
            return Err(self.too_large());
        }

        // Content-Length may be absent or wrong; the cap is enforced per chunk.
        let mut body = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|e| DomainError::FetchFailed(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                warn!(%url, max_bytes = self.max_bytes, "image body over the size cap");
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_and_non_http_urls() {
        let fetcher = HttpImageFetcher::new(Duration::from_secs(1), 1024).unwrap();
        assert!(matches!(fetcher.fetch("not a url").await, Err(DomainError::FetchFailed(_))));
        assert!(matches!(
            fetcher.fetch("file:///etc/passwd").await,
            Err(DomainError::FetchFailed(_))
        ));
    }

    /// Serves `len` bytes with no Content-Length, closing the connection to
    /// end the body.
    async fn serve_unsized(len: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.write_all(&vec![7u8; len]).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/img.png")
    }

    #[tokio::test]
    async fn body_cap_holds_without_content_length() {
        let url = serve_unsized(4096).await;

        let tight = HttpImageFetcher::new(Duration::from_secs(5), 1024).unwrap();
        let err = tight.fetch(&url).await.unwrap_err();
        assert!(matches!(err, DomainError::FetchFailed(msg) if msg.contains("larger than")));

        let roomy = HttpImageFetcher::new(Duration::from_secs(5), 4096).unwrap();
        assert_eq!(roomy.fetch(&url).await.unwrap().len(), 4096);
    }
}
