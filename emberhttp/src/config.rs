//! On-disk configuration for the demonstration server.
//!
//! A single deserializable struct loaded from a file the CLI is told about.
//! Only TOML is supported, since this binary only ever ships one format.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use emberhttp_core::Setting;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub address: String,
    pub port: u16,
    pub header_limit: usize,
    pub body_limit: Option<usize>,
    pub read_timeout_secs: u64,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_origins: Option<Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            address: "127.0.0.1".to_string(),
            port: 8080,
            header_limit: 8 * 1024,
            body_limit: Some(1024 * 1024),
            read_timeout_secs: 60,
            cors: CorsConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            enabled: true,
            allow_origins: None,
        }
    }
}

impl AppConfig {
    /// Loads and parses `path`. Callers that want to fall back to
    /// [`AppConfig::default`] on a missing file do so themselves; a present
    /// but malformed file is always an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {path:?} as TOML"))
    }

    pub fn setting(&self) -> Setting {
        Setting::new()
            .with_header_limit(self.header_limit)
            .with_body_limit(self.body_limit)
            .with_read_timeout(Duration::from_secs(self.read_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_library_settings_defaults() {
        let config = AppConfig::default();
        let setting = config.setting();
        assert_eq!(setting.header_limit, 8192);
        assert_eq!(setting.body_limit, Some(1024 * 1024));
        assert_eq!(setting.read_timeout, Duration::from_secs(60));
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let config: AppConfig = toml::from_str(
            r#"
            address = "0.0.0.0"
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.header_limit, 8192, "unset fields keep their defaults");
    }
}
