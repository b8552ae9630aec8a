//! # waha-gateway
//!
//! Typed session lifecycle client for the WAHA WhatsApp HTTP engine.
//!
//! ## Features
//!
//! - Session create / poll / stop / delete with a local state machine
//! - QR pairing retrieval (string or Base64 image), gated on session state
//! - Process-wide cache of the last observed state per session
//! - One closed error taxonomy for every engine failure
//! - Message, file and group passthroughs
//!
//! ## Example
//!
//! ```ignore
//! use waha_gateway::{Client, Config, QrFormat, RetryPolicy, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new(&Config::from_env()?)?;
//!     client.create_session("demo", SessionConfig::new()).await?;
//!     let qr = RetryPolicy::default()
//!         .retry(|| client.get_pairing("demo", QrFormat::Raw))
//!         .await?;
//!     println!("{}", qr.data);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod pairing;
pub mod registry;
pub mod retry;
pub mod session;
pub mod transport;

pub use client::{ChatMessagesQuery, Client, FileSource, SendFileRequest, SendTextRequest};
pub use config::Config;
pub use error::{translate, ConfigError, Error, ErrorKind, Result, TransportError, TransportErrorKind};
pub use http::HttpTransport;
pub use pairing::{QrArtifact, QrFormat, QrRetriever};
pub use registry::SessionRegistry;
pub use retry::RetryPolicy;
pub use session::{Session, SessionConfig, SessionState, SessionStateMachine};
pub use transport::{EngineTransport, Method, RawResponse};
