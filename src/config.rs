use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the completion service key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

// ---------------------------------------------------------------------------
// Completion service configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct NarrativeConfig {
    /// Bearer credential; never compiled in, never logged.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    /// Upper bound for the whole request.
    pub timeout: Duration,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl NarrativeConfig {
    /// Defaults plus the key from the environment, if set.
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok();
        if api_key.is_none() {
            log::warn!("{API_KEY_ENV} is not set; interpretations will be unavailable");
        }
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// The configured key, or `NoCredential` when absent or blank.
    pub fn credential(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::NoCredential),
        }
    }
}

impl std::fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
