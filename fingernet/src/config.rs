//! Runtime configuration.

use std::path::PathBuf;

use crate::base::{ProxyError, Result};

/// Log output configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
    pub verbose: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "text".into(), verbose: false }
    }
}

/// Proxy configuration, typically populated from CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `scheme://[user:pass@]host:port`, `scheme` in `{http, https, socks5}`.
    pub upstream: Option<String>,
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    /// Name of a registered fingerprint profile.
    pub fingerprint: String,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            upstream: None,
            ca_cert: PathBuf::from("ca.crt"),
            ca_key: PathBuf::from("ca.key"),
            fingerprint: "default".into(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ProxyError::configuration("invalid proxy port"));
        }
        if self.ca_cert.as_os_str().is_empty() || self.ca_key.as_os_str().is_empty() {
            return Err(ProxyError::configuration("CA certificate and key paths are required"));
        }
        match self.log.level.as_str() {
            "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ProxyError::configuration(format!("invalid log level: {other}")))
            }
        }
        match self.log.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(ProxyError::configuration(format!("invalid log format: {other}")))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ErrorKind;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn bad_fields_are_configuration_errors() {
        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().unwrap_err().is_kind(ErrorKind::Configuration));

        let mut config = Config::default();
        config.log.level = "chatty".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ca_cert = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
