//! QR pairing material for sessions waiting to be linked.
//!
//! The engine only produces a QR once its browser runtime finished starting,
//! which takes tens of seconds after create. Retrieval therefore polls the
//! session first and only asks for the QR in `SCAN_QR_CODE`.

use crate::error::{translate, Error};
use crate::session::{session_path, SessionState, SessionStateMachine};
use crate::transport::{Method, RawResponse};
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Requested form of the pairing artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    /// The pairing string to render as a QR code.
    Raw,
    /// A Base64-encoded PNG of the QR code.
    Image,
}

impl QrFormat {
    fn path(self, name: &str) -> String {
        match self {
            Self::Raw => format!("{}/qr", session_path(name)),
            Self::Image => format!("{}/qr-image", session_path(name)),
        }
    }
}

/// Pairing artifact tagged by format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrArtifact {
    pub format: QrFormat,
    /// Pairing string for `Raw`; Base64 image data (no `data:` prefix) for `Image`.
    pub data: String,
    pub mimetype: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Deserialize)]
struct RawQrBody {
    #[serde(alias = "value", alias = "code")]
    pairing_code: String,
    #[serde(default)]
    expires_at: Option<String>,
}

#[derive(Deserialize)]
struct ImageQrBody {
    #[serde(alias = "data", alias = "base64")]
    image: String,
    #[serde(default)]
    mimetype: Option<String>,
}

/// Fetches QR artifacts, gating on a fresh status poll.
pub struct QrRetriever {
    sessions: Arc<SessionStateMachine>,
}

impl QrRetriever {
    pub fn new(sessions: Arc<SessionStateMachine>) -> Self {
        Self { sessions }
    }

    /// `NotReady` while `STARTING` (retry after a few seconds), `InvalidState`
    /// when already `WORKING` or `STOPPED`/`FAILED`.
    pub async fn get_pairing(&self, name: &str, format: QrFormat) -> Result<QrArtifact> {
        let session = self.sessions.get_status(name).await?;
        match session.state {
            SessionState::ScanQrCode => {}
            SessionState::Starting => {
                debug!(session = %name, "qr requested while starting");
                return Err(Error::NotReady {
                    name: name.to_string(),
                    state: session.state,
                });
            }
            state => {
                return Err(Error::InvalidState {
                    name: name.to_string(),
                    state,
                })
            }
        }

        let path = format.path(name);
        let resp = self
            .sessions
            .transport()
            .execute(Method::Get, &path, None, &[])
            .await
            .map_err(|e| translate(e, &path))?;
        let artifact = match format {
            QrFormat::Raw => parse_raw(&resp)?,
            QrFormat::Image => parse_image(&resp)?,
        };
        if artifact.data.is_empty() {
            // engine is in SCAN_QR_CODE but has not rendered the code yet
            return Err(Error::NotReady {
                name: name.to_string(),
                state: SessionState::ScanQrCode,
            });
        }
        info!(session = %name, format = ?format, len = artifact.data.len(), "qr retrieved");
        Ok(artifact)
    }
}

fn parse_raw(resp: &RawResponse) -> Result<QrArtifact> {
    let body: RawQrBody = resp.decode()?;
    Ok(QrArtifact {
        format: QrFormat::Raw,
        data: body.pairing_code,
        mimetype: None,
        expires_at: body.expires_at,
    })
}

/// Accepts `{"image": "<base64>"}`, a `data:` URI in that field, or a raw
/// image body.
fn parse_image(resp: &RawResponse) -> Result<QrArtifact> {
    if resp.body.is_null() {
        return Ok(QrArtifact {
            format: QrFormat::Image,
            data: STANDARD.encode(&resp.bytes),
            mimetype: Some("image/png".to_string()),
            expires_at: None,
        });
    }
    let body: ImageQrBody = resp.decode()?;
    let (mimetype, data) = match body.image.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((mime, data)) => (Some(mime.to_string()), data.to_string()),
            None => return Err(Error::unexpected_body(resp.status, "malformed data uri")),
        },
        None => (body.mimetype, body.image),
    };
    if !data.is_empty() && STANDARD.decode(data.as_bytes()).is_err() {
        return Err(Error::unexpected_body(resp.status, "qr image is not base64"));
    }
    Ok(QrArtifact {
        format: QrFormat::Image,
        data,
        mimetype,
        expires_at: None,
    })
}
