//! Main client.

mod send;

use crate::config::Config;
use crate::error::{translate, ConfigError};
use crate::http::HttpTransport;
use crate::pairing::{QrArtifact, QrFormat, QrRetriever};
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionConfig, SessionStateMachine};
use crate::transport::{EngineTransport, Method, RawResponse};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub use send::{ChatMessagesQuery, FileSource, SendFileRequest, SendTextRequest};

/// Session lifecycle client and engine passthroughs behind one handle.
///
/// Cheap to share behind an `Arc`; the transport pool and the registry are
/// the only shared state.
pub struct Client {
    transport: Arc<dyn EngineTransport>,
    sessions: Arc<SessionStateMachine>,
    qr: QrRetriever,
}

impl Client {
    /// Build a client with a pooled HTTP transport from `config`.
    pub fn new(config: &Config) -> std::result::Result<Self, ConfigError> {
        let transport: Arc<dyn EngineTransport> = Arc::new(HttpTransport::new(config)?);
        let registry = match config.registry_capacity {
            Some(cap) => SessionRegistry::with_capacity(cap),
            None => SessionRegistry::new(),
        };
        info!(engine = %config.engine_url, "waha client initialized");
        Ok(Self::with_transport(transport, Arc::new(registry)))
    }

    /// Build a client over any transport, e.g. a test double.
    pub fn with_transport(
        transport: Arc<dyn EngineTransport>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        let sessions = Arc::new(SessionStateMachine::new(Arc::clone(&transport), registry));
        let qr = QrRetriever::new(Arc::clone(&sessions));
        Self {
            transport,
            sessions,
            qr,
        }
    }

    pub fn sessions(&self) -> &SessionStateMachine {
        &self.sessions
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.sessions.registry()
    }

    pub async fn create_session(&self, name: &str, config: SessionConfig) -> Result<Session> {
        self.sessions.create(name, config).await
    }

    pub async fn get_status(&self, name: &str) -> Result<Session> {
        self.sessions.get_status(name).await
    }

    pub async fn stop_and_delete(&self, name: &str) -> Result<()> {
        self.sessions.stop_and_delete(name).await
    }

    pub async fn stop_session(&self, name: &str) -> Result<Session> {
        self.sessions.stop(name).await
    }

    pub async fn logout(&self, name: &str) -> Result<Session> {
        self.sessions.logout(name).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.sessions.list().await
    }

    pub async fn is_connected(&self, name: &str) -> Result<bool> {
        self.sessions.is_connected(name).await
    }

    pub async fn get_pairing(&self, name: &str, format: QrFormat) -> Result<QrArtifact> {
        self.qr.get_pairing(name, format).await
    }

    /// Whether the engine answers at all. Any failure is `false`.
    pub async fn ping(&self) -> bool {
        match self.transport.execute(Method::Get, "/ping", None, &[]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "engine ping failed");
                false
            }
        }
    }

    /// Engine version information, passed through as is.
    pub async fn version(&self) -> Result<Value> {
        Ok(self.passthrough(Method::Get, "/api/version", None, &[]).await?.body)
    }

    pub(crate) async fn passthrough(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<RawResponse> {
        self.transport
            .execute(method, path, body, query)
            .await
            .map_err(|e| translate(e, path))
    }
}
