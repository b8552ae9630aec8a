//! Transport abstraction for engine calls.
//!
//! Implement this trait to point the session client at something other than a
//! live engine. [`HttpTransport`](crate::http::HttpTransport) is the real
//! implementation; tests use the scripted transport in this module.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// HTTP verbs used against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful (2xx) engine response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Body parsed as JSON; `Value::Null` when empty or not JSON.
    pub body: Value,
    /// Body as received.
    pub bytes: Bytes,
}

impl RawResponse {
    /// Build a response from raw bytes, parsing JSON when possible.
    pub fn from_bytes(status: u16, bytes: Bytes) -> Self {
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Self {
            status,
            body,
            bytes,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        let bytes = Bytes::from(body.to_string());
        Self {
            status,
            body,
            bytes,
        }
    }

    /// Decode the JSON body into one of the typed response shapes.
    pub fn decode<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            tracing::warn!(status = self.status, error = %e, "unexpected engine body");
            crate::Error::unexpected_body(self.status, String::from_utf8_lossy(&self.bytes))
        })
    }
}

/// Authenticated request executor against the engine base URL.
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Issue one call. `path` is relative to the engine base URL.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> std::result::Result<RawResponse, TransportError>;
}
