//! Session demo: create a session, wait for its QR, wait until linked.
//!
//! Run with: `WAHA_URL=http://localhost:3000 WAHA_API_KEY=... cargo run --example session_demo`

use std::time::Duration;
use tracing_subscriber::EnvFilter;
use waha_gateway::{Client, Config, ErrorKind, QrFormat, RetryPolicy, SessionConfig, SessionState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .try_init()
        .ok();

    let client = Client::new(&config)?;
    if !client.ping().await {
        anyhow::bail!("engine at {} is not reachable", config.engine_url);
    }

    let name = std::env::args().nth(1).unwrap_or_else(|| "default".to_string());
    match client.create_session(&name, SessionConfig::new()).await {
        Ok(session) => println!("[Session] {} is {}", session.name, session.state),
        Err(e) if e.kind() == ErrorKind::InvalidTransition => println!("[Session] {name} already active"),
        Err(e) => return Err(e.into()),
    }

    let polling = RetryPolicy::new(20, Duration::from_secs(3)).with_jitter(0.2);
    match polling.retry(|| client.get_pairing(&name, QrFormat::Raw)).await {
        Ok(qr) => println!("[QR] scan with WhatsApp Linked Devices: {}", qr.data),
        Err(e) if e.kind() == ErrorKind::InvalidState => println!("[QR] {name} needs no pairing"),
        Err(e) => return Err(e.into()),
    }

    for _ in 0..40 {
        let session = client.get_status(&name).await?;
        if session.state == SessionState::Working {
            println!("[Session] linked: {:?}", session.engine_metadata.get("me"));
            return Ok(());
        }
        tokio::time::sleep(polling.delay()).await;
    }
    println!("[Session] {name} not linked yet; run again to keep waiting.");
    Ok(())
}
