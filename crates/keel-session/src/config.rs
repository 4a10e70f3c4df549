//! Configuration for session lifecycle and expiry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timeout applied when the configured value is zero or negative.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

/// Default name of the session token carried in the request cookie.
pub const DEFAULT_COOKIE_NAME: &str = "SESSIONID";

/// Default number of slots in the timing wheel (one revolution per minute).
pub const DEFAULT_WHEEL_SLOTS: usize = 60;

/// Default capacity of the in-memory store before LRU eviction.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Configuration for sessions.
///
/// Loaded from TOML; every field is optional:
///
/// ```toml
/// session_timeout_minutes = 10
/// cookie_name = "SID"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity limit in minutes. Values `<= 0` mean "use the default".
    pub session_timeout_minutes: i64,

    /// Name of the session token cookie.
    pub cookie_name: String,

    /// Number of slots in the timing wheel.
    pub wheel_slots: usize,

    /// Maximum number of records held by the in-memory store.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            wheel_slots: DEFAULT_WHEEL_SLOTS,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inactivity timeout in minutes.
    pub fn with_session_timeout_minutes(mut self, minutes: i64) -> Self {
        self.session_timeout_minutes = minutes;
        self
    }

    /// Set the session cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the number of timing-wheel slots.
    pub fn with_wheel_slots(mut self, slots: usize) -> Self {
        self.wheel_slots = slots;
        self
    }

    /// Set the in-memory store capacity.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Inactivity limit for new records, in milliseconds.
    ///
    /// Falls back to 30 minutes when the configured value is not positive.
    pub fn max_inactive_interval_millis(&self) -> u64 {
        let minutes = if self.session_timeout_minutes <= 0 {
            DEFAULT_SESSION_TIMEOUT_MINUTES
        } else {
            self.session_timeout_minutes
        };
        (minutes as u64)
            .saturating_mul(60 * 1000)
            .min(i64::MAX as u64)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_timeout_conversion() {
        let config = SessionConfig::new().with_session_timeout_minutes(10);
        assert_eq!(config.max_inactive_interval_millis(), 600_000);
    }

    #[test]
    fn test_non_positive_timeout_uses_default() {
        for minutes in [0, -5] {
            let config = SessionConfig::new().with_session_timeout_minutes(minutes);
            assert_eq!(config.max_inactive_interval_millis(), 1_800_000);
        }
    }

    #[test]
    fn test_huge_timeout_is_capped() {
        let config = SessionConfig::new().with_session_timeout_minutes(i64::MAX);
        assert_eq!(config.max_inactive_interval_millis(), i64::MAX as u64);
    }

    #[test]
    fn test_to_toml_keeps_settings() {
        let config = SessionConfig::new()
            .with_session_timeout_minutes(12)
            .with_cookie_name("SID");
        let reparsed = SessionConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed.session_timeout_minutes, 12);
        assert_eq!(reparsed.cookie_name, "SID");
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SessionConfig::from_toml("session_timeout_minutes = 5").unwrap();
        assert_eq!(config.session_timeout_minutes, 5);
        assert_eq!(config.cookie_name, DEFAULT_COOKIE_NAME);
        assert_eq!(config.wheel_slots, DEFAULT_WHEEL_SLOTS);
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = SessionConfig::from_toml("session_timeout_minutes = \"ten\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session_timeout_minutes = 15").unwrap();
        writeln!(file, "cookie_name = \"SID\"").unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.max_inactive_interval_millis(), 900_000);
        assert_eq!(config.cookie_name, "SID");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SessionConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
