use super::{EngineSession, Session, SessionConfig, SessionState};
use crate::error::{translate, Error, ErrorKind};
use crate::registry::SessionRegistry;
use crate::transport::{EngineTransport, Method, RawResponse};
use crate::Result;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine path prefix for one session.
pub(crate) fn session_path(name: &str) -> String {
    format!("/api/sessions/{}", urlencoding::encode(name))
}

/// Create, poll, stop and delete engine sessions.
///
/// Every engine answer is written to the registry; the registry is only
/// consulted to reject `create` locally and to pick the engine endpoint.
pub struct SessionStateMachine {
    transport: Arc<dyn EngineTransport>,
    registry: Arc<SessionRegistry>,
    /// Names with a `create` still waiting on the engine. Only locked while
    /// the registry lock is held, or on its own.
    pending: Mutex<HashMap<String, usize>>,
}

/// Releases one in-flight `create` for a name when dropped.
struct PendingCreate<'a> {
    pending: &'a Mutex<HashMap<String, usize>>,
    name: &'a str,
}

impl Drop for PendingCreate<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if let Some(count) = pending.get_mut(self.name) {
            *count -= 1;
            if *count == 0 {
                pending.remove(self.name);
            }
        }
    }
}

impl SessionStateMachine {
    pub fn new(transport: Arc<dyn EngineTransport>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            transport,
            registry,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub(crate) fn transport(&self) -> &Arc<dyn EngineTransport> {
        &self.transport
    }

    /// Create and start a session.
    ///
    /// Rejected with `InvalidTransition`, without calling the engine, while
    /// the cached state is `STARTING`, `SCAN_QR_CODE` or `WORKING`. A cached
    /// `STOPPED`/`FAILED` session is resumed through the engine's start
    /// endpoint since the engine still holds it.
    pub async fn create(&self, name: &str, config: SessionConfig) -> Result<Session> {
        let prior = self.registry.modify(name, |slot| {
            let prior = slot.as_ref().map(|s| s.state);
            if let Some(state) = prior.filter(|s| !s.accepts_create()) {
                return Err(Error::InvalidTransition {
                    name: name.to_string(),
                    from: state,
                    operation: "create",
                });
            }
            let reserved = match slot.take() {
                Some(s) => s.observed(SessionState::Starting),
                None => Session::new(name, SessionState::Starting),
            };
            *slot = Some(reserved);
            *self.pending.lock().entry(name.to_string()).or_default() += 1;
            Ok(prior)
        });
        let prior = match prior {
            Ok(p) => p,
            Err(e) => {
                debug!(session = %name, error = %e, "create rejected locally");
                return Err(e);
            }
        };
        let _pending = PendingCreate {
            pending: &self.pending,
            name,
        };

        let result = match prior {
            Some(state) => {
                info!(session = %name, from = %state, "resuming existing session");
                match self
                    .call(Method::Post, &format!("{}/start", session_path(name)), None)
                    .await
                {
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        debug!(session = %name, "engine no longer holds session, creating");
                        self.create_and_start(name, &config).await
                    }
                    other => other,
                }
            }
            None => {
                info!(session = %name, "creating session");
                self.create_and_start(name, &config).await
            }
        };

        match result.and_then(|resp| self.observe(name, &resp, Some(SessionState::Starting))) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(session = %name, error = %e, "create failed");
                self.registry.modify(name, |slot| {
                    let failed = match slot.take() {
                        Some(s) => s.observed(SessionState::Failed),
                        None => Session::new(name, SessionState::Failed),
                    };
                    *slot = Some(failed);
                });
                Err(e)
            }
        }
    }

    /// Poll the engine for the current state. The cache is never trusted
    /// here; an engine 404 also drops the cached record.
    pub async fn get_status(&self, name: &str) -> Result<Session> {
        match self.call(Method::Get, &session_path(name), None).await {
            Ok(resp) => self.observe(name, &resp, None),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    self.forget(name);
                }
                Err(e)
            }
        }
    }

    /// Delete the session on the engine and forget it locally.
    ///
    /// `NotFound` means the engine had no such session; the cached record is
    /// dropped in that case too so callers can treat it as success.
    pub async fn stop_and_delete(&self, name: &str) -> Result<()> {
        match self.call(Method::Delete, &session_path(name), None).await {
            Ok(_) => {
                self.registry.remove(name);
                info!(session = %name, "session deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.registry.remove(name);
                debug!(session = %name, "delete: already absent");
                Err(e)
            }
            Err(e) => {
                warn!(session = %name, error = %e, "delete failed");
                Err(e)
            }
        }
    }

    /// Stop the session but keep it on the engine; a later `create` resumes it.
    pub async fn stop(&self, name: &str) -> Result<Session> {
        match self
            .call(Method::Post, &format!("{}/stop", session_path(name)), None)
            .await
        {
            Ok(resp) => {
                let session = self.observe(name, &resp, Some(SessionState::Stopped))?;
                info!(session = %name, state = %session.state, "session stopped");
                Ok(session)
            }
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    self.forget(name);
                }
                Err(e)
            }
        }
    }

    /// Unlink the WhatsApp account from the session. The engine keeps the
    /// session itself.
    pub async fn logout(&self, name: &str) -> Result<Session> {
        match self
            .call(Method::Post, &format!("{}/logout", session_path(name)), None)
            .await
        {
            Ok(resp) => self.observe(name, &resp, Some(SessionState::Stopped)),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    self.forget(name);
                }
                Err(e)
            }
        }
    }

    /// List engine sessions, including stopped ones, and refresh the cache
    /// for each.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let resp = self
            .transport
            .execute(Method::Get, "/api/sessions", None, &[("all", "true".to_string())])
            .await
            .map_err(|e| translate(e, "sessions"))?;
        let bodies: Vec<EngineSession> = resp.decode()?;
        let mut sessions = Vec::with_capacity(bodies.len());
        for body in bodies {
            let Some(name) = body.name.clone() else {
                warn!("engine listed a session without a name");
                continue;
            };
            match body.into_session(&name) {
                Ok(session) => {
                    self.registry.put(&name, session.clone());
                    sessions.push(session);
                }
                Err(unknown) => {
                    warn!(session = %name, status = %unknown.0, "unknown session status")
                }
            }
        }
        Ok(sessions)
    }

    /// Cached view without contacting the engine.
    pub fn cached(&self, name: &str) -> Option<Session> {
        self.registry.get(name)
    }

    /// Whether a fresh poll reports the session as `WORKING`.
    pub async fn is_connected(&self, name: &str) -> Result<bool> {
        Ok(self.get_status(name).await?.state == SessionState::Working)
    }

    /// Poll every cached session concurrently.
    pub async fn refresh_all(&self) -> Vec<(String, Result<Session>)> {
        let names = self.registry.names();
        let polls = names.iter().map(|n| self.get_status(n));
        let results = join_all(polls).await;
        names.into_iter().zip(results).collect()
    }

    async fn create_and_start(&self, name: &str, config: &SessionConfig) -> Result<RawResponse> {
        let body = json!({ "name": name, "config": config });
        self.call(Method::Post, "/api/sessions/start", Some(&body))
            .await
    }

    /// Drop the cached record after an engine 404. The STARTING reservation
    /// of a `create` still in flight is kept so a second `create` keeps
    /// failing locally.
    fn forget(&self, name: &str) {
        self.registry.modify(name, |slot| {
            if self.pending.lock().contains_key(name) {
                debug!(session = %name, "404 during create, keeping reservation");
            } else if slot.take().is_some() {
                debug!(session = %name, "engine no longer holds session");
            }
        });
    }

    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<RawResponse> {
        self.transport
            .execute(method, path, body, &[])
            .await
            .map_err(|e| translate(e, path))
    }

    /// Record an engine session body. When the engine omits `status`
    /// (stop/start replies may be bare acks) `default` is recorded; without
    /// a default a missing status is an unexpected body.
    fn observe(
        &self,
        name: &str,
        resp: &RawResponse,
        default: Option<SessionState>,
    ) -> Result<Session> {
        let body: Option<EngineSession> = if resp.body.is_object() {
            Some(resp.decode()?)
        } else {
            None
        };
        let session = match (body, default) {
            (Some(body), _) if body.status.is_some() => {
                body.into_session(name).map_err(|unknown| {
                    Error::unexpected_body(resp.status, format!("unknown status {:?}", unknown.0))
                })?
            }
            (Some(body), Some(state)) => {
                let mut s = Session::new(name, state);
                s.engine_metadata = body.extra;
                s
            }
            (None, Some(state)) => Session::new(name, state),
            (_, None) => {
                return Err(Error::unexpected_body(
                    resp.status,
                    String::from_utf8_lossy(&resp.bytes),
                ))
            }
        };

        self.registry.modify(name, |slot| {
            let prev = slot.as_ref().map(|s| s.state);
            if prev != Some(session.state) {
                debug!(session = %name, from = ?prev, to = %session.state, "state change");
            }
            *slot = Some(session.clone());
        });
        Ok(session)
    }
}
