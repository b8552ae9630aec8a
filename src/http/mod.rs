//! reqwest-backed [`EngineTransport`].
//!
//! One pooled `reqwest::Client` is built at construction and reused for every
//! call. The shared secret travels as a default header so no call can omit it.

use crate::config::{Config, API_KEY_HEADER};
use crate::error::{ConfigError, TransportError};
use crate::transport::{EngineTransport, Method, RawResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let mut value =
                HeaderValue::from_str(key).map_err(|e| ConfigError::InvalidValue {
                    key: "api_key",
                    reason: e.to_string(),
                })?;
            value.set_sensitive(true);
            headers.insert(api_key_header()?, value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        debug!(
            base_url = %config.engine_url,
            authenticated = config.api_key.is_some(),
            header = API_KEY_HEADER,
            "engine transport ready"
        );
        Ok(Self {
            client,
            base_url: config.engine_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn network(err: reqwest::Error) -> TransportError {
    let detail = if err.is_timeout() {
        format!("timeout: {err}")
    } else if err.is_connect() {
        format!("connect: {err}")
    } else {
        err.to_string()
    };
    TransportError::Network(detail)
}

#[async_trait]
impl EngineTransport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(to_reqwest(method), &url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let started = Instant::now();
        let resp = req.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "engine unreachable");
            network(e)
        })?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(network)?;
        debug!(
            %method,
            path,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "engine call"
        );

        if !(200..300).contains(&status) {
            return Err(TransportError::HttpStatus {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(RawResponse::from_bytes(status, bytes))
    }
}

/// Header carrying the engine API key, built from [`API_KEY_HEADER`].
fn api_key_header() -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(API_KEY_HEADER.as_bytes()).map_err(|e| ConfigError::InvalidValue {
        key: "api_key_header",
        reason: e.to_string(),
    })
}
