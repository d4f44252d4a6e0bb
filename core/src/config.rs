//! Environment-driven configuration.
//!
//! # Environment Variables
//!
//! - `RELAY_CONNECT_TIMEOUT_SECS`: connect timeout applied to every transfer
//! - `RELAY_TIMEOUT_SECS`: overall timeout applied to every transfer
//! - `RELAY_MAX_REDIRECTS`: redirect limit (0 disables following)
//! - `RELAY_USER_AGENT`: default `User-Agent`
//! - `RELAY_SUCCESS_LOG`, `RELAY_ERROR_LOG`: outcome log paths
//! - `RELAY_SPOOL_DIR`: directory for per-ID response/error files
//!
//! Unset transport variables fall back to `TransportConfig::default()`, which
//! imposes no timeouts at all.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default redirect limit, matching the `ureq` agent default.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Defaults applied to every transfer of a `UreqTransport`. Request options
/// override these per transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    pub max_redirects: u32,
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            timeout: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
        }
    }
}

impl TransportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            connect_timeout: parse_var::<u64>("RELAY_CONNECT_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            timeout: parse_var::<u64>("RELAY_TIMEOUT_SECS")?.map(Duration::from_secs),
            max_redirects: parse_var("RELAY_MAX_REDIRECTS")?.unwrap_or(defaults.max_redirects),
            user_agent: std::env::var("RELAY_USER_AGENT").ok(),
        })
    }
}

/// Where success and error records are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub success_path: Option<PathBuf>,
    pub error_path: Option<PathBuf>,
}

impl LogSettings {
    pub fn new(success_path: impl Into<PathBuf>, error_path: impl Into<PathBuf>) -> Self {
        Self {
            success_path: Some(success_path.into()),
            error_path: Some(error_path.into()),
        }
    }

    /// Both paths are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let success = std::env::var("RELAY_SUCCESS_LOG")
            .map_err(|_| ConfigError::Missing("RELAY_SUCCESS_LOG"))?;
        let error = std::env::var("RELAY_ERROR_LOG")
            .map_err(|_| ConfigError::Missing("RELAY_ERROR_LOG"))?;
        Ok(Self::new(success, error))
    }
}

/// Parse an optional environment variable. Unset is `Ok(None)`; set but
/// unparsable is an error.
pub(crate) fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns distinct variable names: tests run in parallel threads
    // sharing one process environment.

    #[test]
    fn default_transport_config_has_no_timeouts() {
        let config = TransportConfig::default();
        assert!(config.timeout.is_none());
        assert!(config.connect_timeout.is_none());
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
    }

    #[test]
    fn parse_var_reads_and_rejects() {
        std::env::set_var("RELAY_TEST_PARSE_OK", " 15 ");
        assert_eq!(parse_var::<u64>("RELAY_TEST_PARSE_OK").unwrap(), Some(15));

        std::env::set_var("RELAY_TEST_PARSE_BAD", "soon");
        let err = parse_var::<u64>("RELAY_TEST_PARSE_BAD").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "RELAY_TEST_PARSE_BAD", .. }));

        assert_eq!(parse_var::<u64>("RELAY_TEST_PARSE_UNSET").unwrap(), None);
    }

    #[test]
    fn log_settings_from_env() {
        std::env::set_var("RELAY_SUCCESS_LOG", "/var/log/relay/ok.log");
        std::env::set_var("RELAY_ERROR_LOG", "/var/log/relay/err.log");
        let settings = LogSettings::from_env().unwrap();
        assert_eq!(settings, LogSettings::new("/var/log/relay/ok.log", "/var/log/relay/err.log"));
    }
}
