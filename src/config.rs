//! Process configuration loaded from the environment.

use crate::progress::{ProgressNarrator, DEFAULT_INTERVAL, DEFAULT_MESSAGES};
use std::time::Duration;

/// Environment variable holding the API token.
pub const API_KEY_VAR: &str = "HUGGINGFACE_API_KEY";

const MODEL_VAR: &str = "IMGDROP_MODEL";
const ENDPOINT_VAR: &str = "IMGDROP_ENDPOINT";
const TIMEOUT_VAR: &str = "IMGDROP_TIMEOUT_SECS";
const INTERVAL_VAR: &str = "IMGDROP_PROGRESS_INTERVAL_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for any configured duration (one day).
const MAX_DURATION_SECS: u64 = 86_400;

/// Runtime settings.
///
/// A missing token is not an error here; the first synthesis call reports it.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Model id on the inference API.
    pub model: Option<String>,
    /// Full endpoint override.
    pub endpoint: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Gap between progress messages.
    pub progress_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: None,
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            progress_interval: DEFAULT_INTERVAL,
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and reads settings from the environment.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, ignoring blank, unparsable or
    /// out-of-range values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |key: &str| {
            get(key).and_then(|v| match v.parse::<u64>() {
                Ok(n) if (1..=MAX_DURATION_SECS).contains(&n) => Some(Duration::from_secs(n)),
                _ => {
                    tracing::warn!(var = key, value = %v, "ignoring invalid duration");
                    None
                }
            })
        };

        let defaults = Self::default();
        Self {
            model: get(MODEL_VAR),
            endpoint: get(ENDPOINT_VAR),
            timeout: secs(TIMEOUT_VAR).unwrap_or(defaults.timeout),
            progress_interval: secs(INTERVAL_VAR).unwrap_or(defaults.progress_interval),
        }
    }

    /// Narrator using the default messages at the configured interval.
    pub fn narrator(&self) -> ProgressNarrator {
        ProgressNarrator::with_interval(DEFAULT_MESSAGES, self.progress_interval)
    }

    /// Builds the Hugging Face provider for these settings.
    #[cfg(feature = "huggingface")]
    pub fn provider(&self) -> crate::Result<crate::synthesis::providers::HuggingFaceProvider> {
        use crate::synthesis::providers::HuggingFaceProvider;
        use crate::synthesis::EnvCredentials;
        use std::sync::Arc;

        let mut builder = HuggingFaceProvider::builder()
            .credentials(Arc::new(EnvCredentials::new(API_KEY_VAR)))
            .timeout(self.timeout);
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint);
        }
        builder.build()
    }
}
