use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MedchainClientError;

/// Configuration of a client [`crate::Session`].
///
/// Every field is optional in JSON:
///
/// ```json
/// { "poll_interval_ms": 50, "wait_timeout_ms": 5000, "max_commit_retries": 3 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Delay between two reads while waiting for a status
    pub poll_interval_ms: u64,

    /// Upper bound on any wait for a status
    pub wait_timeout_ms: u64,

    /// How often a transaction is re-signed after a counter conflict
    pub max_commit_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            wait_timeout_ms: 5_000,
            max_commit_retries: 3,
        }
    }
}

impl ClientConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, MedchainClientError> {
        serde_json::from_str(json).map_err(|error| MedchainClientError::Config(error.to_string()))
    }

    /// [`Self::poll_interval_ms`] as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// [`Self::wait_timeout_ms`] as a duration.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}
