//! Correlation identifiers.
//!
//! An ID is embedded in every log record for its request and is the key for
//! later lookups, so it must never contain the record delimiters `:` or `|`
//! or a line break. Both generators emit lowercase hex only.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token identifying one dispatched request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Time-based ID: 8 hex digits of seconds and 5 of microseconds since the
    /// Unix epoch. Two calls within the same microsecond collide.
    pub fn coarse() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(format!("{:08x}{:05x}", now.as_secs(), now.subsec_micros()))
    }

    /// High-entropy ID (v4 UUID, simple form).
    pub fn unique() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wraps a caller-chosen ID. Delimiter characters would corrupt the log and
/// are stripped.
impl From<&str> for CorrelationId {
    fn from(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(|c| !matches!(c, ':' | '|' | '\n' | '\r'))
                .collect(),
        )
    }
}

impl From<String> for CorrelationId {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}
