// Upstream HTTP transport

use crate::config::{LimitSettings, SoilWmsConfig};
use crate::error::{Result, SoilError};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Body and metadata of a successful upstream response
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Performs a single GET against the WMS endpoint.
///
/// Implementations map every transport failure and non-2xx status to
/// [`SoilError::ServiceUnavailable`]. There are no retries.
#[async_trait]
pub trait WmsTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<UpstreamResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_body_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &SoilWmsConfig) -> Result<Self> {
        Ok(Self::with_timeout(config.timeout(), &config.wms.user_agent)?
            .with_max_body_bytes(config.limits.max_upstream_bytes))
    }

    pub fn with_timeout(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SoilError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_body_bytes: LimitSettings::default().max_upstream_bytes,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[async_trait]
impl WmsTransport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<UpstreamResponse> {
        debug!(url = %url, "GET request");

        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(error = %e, "WMS request failed");
            if e.is_timeout() {
                SoilError::service_unavailable(format!("request timed out: {}", e))
            } else {
                SoilError::service_unavailable(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            warn!(status = status.as_u16(), "WMS returned error status");
            return Err(SoilError::service_unavailable(format!(
                "upstream returned HTTP {}",
                status
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                warn!(length, limit = self.max_body_bytes, "WMS response too large");
                return Err(too_large(self.max_body_bytes));
            }
        }

        // Content-Length may be absent or wrong, so the limit is also enforced per chunk
        let mut buf = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SoilError::service_unavailable(format!("failed to read response body: {}", e)))?
        {
            if buf.len() + chunk.len() > self.max_body_bytes {
                warn!(limit = self.max_body_bytes, "WMS response too large");
                return Err(too_large(self.max_body_bytes));
            }
            buf.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&buf).into_owned();

        Ok(UpstreamResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn too_large(limit: usize) -> SoilError {
    SoilError::service_unavailable(format!("upstream response exceeds {} bytes", limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::with_timeout(Duration::from_secs(5), "soilwms-test").unwrap()
    }

    #[tokio::test]
    async fn test_get_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/wms"))
            .and(query_param("REQUEST", "GetCapabilities"))
            .and(header_matcher("user-agent", "soilwms-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/xml")
                    .set_body_string("<WMS_Capabilities/>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/wms?SERVICE=WMS&REQUEST=GetCapabilities", server.uri())).unwrap();
        let response = transport().get(&url).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/xml"));
        assert_eq!(response.body, "<WMS_Capabilities/>");
    }

    #[tokio::test]
    async fn test_error_status_is_service_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/wms"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/wms", server.uri())).unwrap();
        let err = transport().get(&url).await.unwrap_err();
        assert!(matches!(err, SoilError::ServiceUnavailable(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_timeout_is_service_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = HttpTransport::with_timeout(Duration::from_millis(200), "soilwms-test").unwrap();
        let url = Url::parse(&format!("{}/wms", server.uri())).unwrap();
        let err = transport.get(&url).await.unwrap_err();
        assert!(matches!(err, SoilError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/wms"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/wms", server.uri())).unwrap();

        let err = transport().with_max_body_bytes(32).get(&url).await.unwrap_err();
        assert!(matches!(err, SoilError::ServiceUnavailable(ref m) if m.contains("exceeds 32 bytes")));

        let response = transport().with_max_body_bytes(64).get(&url).await.unwrap();
        assert_eq!(response.body.len(), 64);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let server = MockServer::start().await;
        let url = Url::parse(&format!("{}/wms", server.uri())).unwrap();
        drop(server);

        let err = transport().get(&url).await.unwrap_err();
        assert!(matches!(err, SoilError::ServiceUnavailable(_)));
    }
}
