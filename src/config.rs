//! Engine connection settings.

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Default engine URL when `WAHA_URL` is unset.
pub const DEFAULT_ENGINE_URL: &str = "http://localhost:3000";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the shared secret on every engine call.
pub const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine base URL, without trailing slash.
    pub engine_url: String,
    /// Shared secret sent as `X-Api-Key`. `None` sends no header.
    pub api_key: Option<String>,
    /// Bound on each engine call.
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Default tracing filter for binaries embedding the client.
    pub log_level: String,
    /// Maximum cached sessions; `None` keeps every entry until deleted.
    pub registry_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            log_level: "info".to_string(),
            registry_capacity: None,
        }
    }
}

impl Config {
    pub fn new(engine_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            engine_url: normalize_url(&engine_url.into()),
            api_key,
            ..Self::default()
        }
    }

    /// Read `WAHA_URL`, `WAHA_API_KEY`, `WAHA_TIMEOUT_SECS`, `LOG_LEVEL` and
    /// `WAHA_REGISTRY_CAPACITY`, falling back to defaults for unset values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(url) = lookup("WAHA_URL").filter(|v| !v.trim().is_empty()) {
            cfg.engine_url = normalize_url(&url);
        }
        cfg.api_key = lookup("WAHA_API_KEY").filter(|v| !v.is_empty());
        if let Some(raw) = lookup("WAHA_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "WAHA_TIMEOUT_SECS",
                reason: format!("not a whole number of seconds: {raw:?}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "WAHA_TIMEOUT_SECS",
                    reason: "must be greater than zero".into(),
                });
            }
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            cfg.log_level = level.to_lowercase();
        }
        if let Some(raw) = lookup("WAHA_REGISTRY_CAPACITY") {
            let cap: usize = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "WAHA_REGISTRY_CAPACITY",
                reason: format!("not a number: {raw:?}"),
            })?;
            cfg.registry_capacity = (cap > 0).then_some(cap);
        }
        Ok(cfg)
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.engine_url, DEFAULT_ENGINE_URL);
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert_eq!(cfg.registry_capacity, None);
    }

    #[test]
    fn reads_values_and_strips_slash() {
        let cfg = Config::from_lookup(lookup(&[
            ("WAHA_URL", "http://waha:3000/"),
            ("WAHA_API_KEY", "secret"),
            ("WAHA_TIMEOUT_SECS", "5"),
            ("LOG_LEVEL", "DEBUG"),
            ("WAHA_REGISTRY_CAPACITY", "64"),
        ]))
        .unwrap();
        assert_eq!(cfg.engine_url, "http://waha:3000");
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.registry_capacity, Some(64));
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(Config::from_lookup(lookup(&[("WAHA_TIMEOUT_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WAHA_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"engine_url":"http://e","timeout":7}"#).unwrap();
        assert_eq!(cfg.engine_url, "http://e");
        assert_eq!(cfg.timeout, Duration::from_secs(7));
        assert_eq!(cfg.log_level, "info");
    }
}
