use crate::domain::ports::{HttpProbe, ProbeResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// 2xx 或 404 都算服務已經起來（新安裝的服務對特定路徑可能回 404）
pub fn classify_status(status: StatusCode) -> ProbeResult {
    if status.is_success() || status == StatusCode::NOT_FOUND {
        ProbeResult::Healthy(status.as_u16())
    } else {
        ProbeResult::Unhealthy(status.as_u16())
    }
}

pub fn classify_error(error: &reqwest::Error) -> ProbeResult {
    if error.is_builder() || is_tls_failure(error) {
        ProbeResult::Fatal(error_chain(error))
    } else {
        ProbeResult::Transient(error_chain(error))
    }
}

// rustls reports certificate problems as io::ErrorKind::InvalidData
fn is_tls_failure(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::InvalidData {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}

#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        match self.client.get(url).send().await {
            Ok(response) => classify_status(response.status()),
            Err(e) => classify_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_buckets() {
        assert_eq!(classify_status(StatusCode::OK), ProbeResult::Healthy(200));
        assert_eq!(classify_status(StatusCode::NO_CONTENT), ProbeResult::Healthy(204));
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ProbeResult::Healthy(404));
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            ProbeResult::Unhealthy(503)
        );
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ProbeResult::Unhealthy(403));
        assert_eq!(
            classify_status(StatusCode::MOVED_PERMANENTLY),
            ProbeResult::Unhealthy(301)
        );
    }

    #[tokio::test]
    async fn test_malformed_url_is_fatal() {
        let probe = ReqwestProbe::new(DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert!(matches!(probe.probe("::not a url::").await, ProbeResult::Fatal(_)));
    }
}
