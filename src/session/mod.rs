//! Session model and lifecycle.

mod machine;

pub(crate) use machine::session_path;
pub use machine::SessionStateMachine;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Engine-side lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Stopped,
    Starting,
    ScanQrCode,
    Working,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::ScanQrCode => "SCAN_QR_CODE",
            Self::Working => "WORKING",
            Self::Failed => "FAILED",
        }
    }

    /// Whether `create` may be issued from this state. An absent record
    /// counts as `Stopped`.
    pub fn accepts_create(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status string the engine sent that is not one of the known states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl FromStr for SessionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOPPED" => Ok(Self::Stopped),
            "STARTING" => Ok(Self::Starting),
            "SCAN_QR_CODE" => Ok(Self::ScanQrCode),
            "WORKING" => Ok(Self::Working),
            "FAILED" => Ok(Self::Failed),
            _ => Err(UnknownState(s.to_string())),
        }
    }
}

/// Last observed view of one engine session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub name: String,
    pub state: SessionState,
    /// Engine fields the core does not interpret (`me`, `config`, ...).
    pub engine_metadata: Map<String, Value>,
    pub last_observed_at: SystemTime,
}

impl Session {
    pub fn new(name: impl Into<String>, state: SessionState) -> Self {
        Self {
            name: name.into(),
            state,
            engine_metadata: Map::new(),
            last_observed_at: SystemTime::now(),
        }
    }

    /// Same session observed again in `state`; metadata is kept.
    pub(crate) fn observed(mut self, state: SessionState) -> Self {
        self.state = state;
        self.last_observed_at = SystemTime::now();
        self
    }
}

/// Opaque engine session configuration forwarded on create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionConfig(pub Map<String, Value>);

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }
}

/// Session body returned by create, start, stop, status and list calls.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EngineSession {
    #[serde(default)]
    pub name: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EngineSession {
    pub fn into_session(self, fallback_name: &str) -> Result<Session, UnknownState> {
        let state = match self.status.as_deref() {
            Some(s) => s.parse()?,
            None => return Err(UnknownState(String::new())),
        };
        Ok(Session {
            name: self.name.unwrap_or_else(|| fallback_name.to_string()),
            state,
            engine_metadata: self.extra,
            last_observed_at: SystemTime::now(),
        })
    }
}
