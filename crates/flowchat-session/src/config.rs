//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default peer endpoint; the session id is appended as the last path segment.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:5003/chat";

/// Default wait between the dialog closing and the host being told.
pub const DEFAULT_CLOSE_DELAY: Duration = Duration::from_millis(300);

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Chat session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base WebSocket URL.
    pub endpoint: String,
    /// Deferred teardown after the dialog closes.
    #[serde(with = "millis")]
    pub close_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            close_delay: DEFAULT_CLOSE_DELAY,
        }
    }
}

impl ChatConfig {
    /// Defaults overridden by `FLOWCHAT_ENDPOINT` and `FLOWCHAT_CLOSE_DELAY_MS`.
    ///
    /// # Errors
    /// Returns error if the delay is not a whole number of milliseconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|var| std::env::var(var).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("FLOWCHAT_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            config.endpoint = endpoint;
        }

        if let Some(value) = lookup("FLOWCHAT_CLOSE_DELAY_MS") {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "FLOWCHAT_CLOSE_DELAY_MS",
                    value: value.clone(),
                })?;
            config.close_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
