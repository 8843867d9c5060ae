use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::error::NetworkError;
use crate::models::{CacheMode, Request, Response};

use super::Network;

/// HTTP request timeout in seconds.
/// A hung request only delays the fall back to cache, it is never cancelled
/// sooner than this.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Network backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new() -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    fn headers(request: &Request) -> Result<header::HeaderMap, NetworkError> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NetworkError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| NetworkError::InvalidRequest(format!("header value: {}", e)))?;
            headers.append(name, value);
        }
        if request.cache_mode == CacheMode::Reload {
            headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
        }
        Ok(headers)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::headers(request)?)
            .send()
            .await?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "Network response");

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            url: Some(url),
        })
    }
}
