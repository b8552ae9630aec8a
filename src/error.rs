use crate::session::SessionState;
use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by session, pairing and passthrough operations.
///
/// The set is closed: a boundary layer can map each variant to a fixed
/// response without looking at engine-specific text.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("session {name}: cannot {operation} while {from}")]
    InvalidTransition {
        name: String,
        from: SessionState,
        operation: &'static str,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("session {name} is not ready ({state})")]
    NotReady { name: String, state: SessionState },

    #[error("session {name}: operation not valid while {state}")]
    InvalidState { name: String, state: SessionState },

    #[error("engine rejected credentials (status {status})")]
    Auth { status: u16 },

    #[error("engine rejected request: {body}")]
    InvalidRequest { body: String },

    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("unexpected engine response (status {status:?}): {body}")]
    UnknownEngine { status: Option<u16>, body: String },
}

/// Stable discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidTransition,
    NotFound,
    NotReady,
    InvalidState,
    AuthError,
    InvalidRequest,
    EngineUnavailable,
    UnknownEngineError,
}

impl ErrorKind {
    /// Whether the same call may succeed later with no other change.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NotReady | Self::EngineUnavailable)
    }

    /// Suggested HTTP status for a boundary layer rendering this kind.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidTransition | Self::InvalidState => 409,
            Self::NotFound => 404,
            Self::NotReady => 425,
            Self::AuthError => 502,
            Self::InvalidRequest => 422,
            Self::EngineUnavailable => 503,
            Self::UnknownEngineError => 502,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Auth { .. } => ErrorKind::AuthError,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Self::UnknownEngine { .. } => ErrorKind::UnknownEngineError,
        }
    }

    /// Wrap a successful response whose body did not have the expected shape.
    pub(crate) fn unexpected_body(status: u16, body: impl Into<String>) -> Self {
        Self::UnknownEngine {
            status: Some(status),
            body: body.into(),
        }
    }
}

/// Whether a transport failure happened before or after an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Network,
    HttpStatus,
}

/// Raw failure from an [`EngineTransport`](crate::EngineTransport) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connect refused, DNS failure, timeout, or a body that could not be read.
    #[error("network: {0}")]
    Network(String),

    /// Engine answered with a non-2xx status. `body` is kept verbatim.
    #[error("http {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Network(_) => TransportErrorKind::Network,
            Self::HttpStatus { .. } => TransportErrorKind::HttpStatus,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network(_) => None,
            Self::HttpStatus { status, .. } => Some(*status),
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Network(_) => None,
            Self::HttpStatus { body, .. } => Some(body),
        }
    }
}

/// Map a raw transport failure into the closed [`Error`] taxonomy.
///
/// The outcome depends only on the status class; `context` names the
/// resource for `NotFound` and `body` is only carried along.
pub fn translate(err: TransportError, context: &str) -> Error {
    match err {
        TransportError::Network(msg) => Error::EngineUnavailable(msg),
        TransportError::HttpStatus { status, body } => match status {
            401 | 403 => Error::Auth { status },
            404 => Error::NotFound(context.to_string()),
            422 => Error::InvalidRequest { body },
            500..=599 if body.is_empty() => Error::EngineUnavailable(format!("status {status}")),
            500..=599 => Error::EngineUnavailable(format!("status {status}: {body}")),
            _ => Error::UnknownEngine {
                status: Some(status),
                body,
            },
        },
    }
}

/// Configuration and construction errors. Kept apart from [`Error`] since
/// they happen before any engine call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> TransportError {
        TransportError::HttpStatus {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn status_mapping_ignores_body() {
        let cases = [
            (401, ErrorKind::AuthError),
            (403, ErrorKind::AuthError),
            (404, ErrorKind::NotFound),
            (422, ErrorKind::InvalidRequest),
            (500, ErrorKind::EngineUnavailable),
            (503, ErrorKind::EngineUnavailable),
        ];
        for (status, expected) in cases {
            for body in ["", "{\"error\":\"x\"}", "<html>gateway</html>"] {
                assert_eq!(translate(http(status, body), "s").kind(), expected);
            }
        }
    }

    #[test]
    fn network_failure_is_unavailable() {
        let err = translate(TransportError::Network("connection refused".into()), "s");
        assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn other_statuses_carry_body() {
        let err = translate(http(409, "{\"message\":\"conflict\"}"), "s");
        match err {
            Error::UnknownEngine { status, body } => {
                assert_eq!(status, Some(409));
                assert!(body.contains("conflict"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_error_keeps_engine_body() {
        let err = translate(http(500, "{\"error\":\"chrome crashed\"}"), "s");
        match err {
            Error::EngineUnavailable(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("chrome crashed"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let bare = translate(http(503, ""), "s");
        assert_eq!(bare.to_string(), Error::EngineUnavailable("status 503".into()).to_string());
    }

    #[test]
    fn not_found_names_context() {
        let err = translate(http(404, ""), "session demo");
        assert_eq!(err.to_string(), "not found: session demo");
    }

    #[test]
    fn transport_error_accessors() {
        let e = http(502, "bad gateway");
        assert_eq!(e.kind(), TransportErrorKind::HttpStatus);
        assert_eq!(e.status(), Some(502));
        assert_eq!(e.body(), Some("bad gateway"));
        let n = TransportError::Network("timeout".into());
        assert_eq!(n.kind(), TransportErrorKind::Network);
        assert_eq!(n.status(), None);
    }
}
