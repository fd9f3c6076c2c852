//! Formation coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Formation coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormationConfig {
    /// Seconds a game may stay in formation before it expires
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound in seconds for cleanup calls during shutdown
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Buffer size of the expiry request channel
    #[serde(rename = "expiry-channel-buffer", default = "default_expiry_channel_buffer")]
    pub expiry_channel_buffer: usize,
}

fn default_timeout_secs() -> u64 {
    debug!("default_timeout_secs: called");
    30 * 60
}

fn default_shutdown_grace_secs() -> u64 {
    debug!("default_shutdown_grace_secs: called");
    10
}

fn default_expiry_channel_buffer() -> usize {
    debug!("default_expiry_channel_buffer: called");
    64
}

impl Default for FormationConfig {
    fn default() -> Self {
        debug!("FormationConfig::default: called");
        Self {
            timeout_secs: default_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            expiry_channel_buffer: default_expiry_channel_buffer(),
        }
    }
}

impl FormationConfig {
    /// Default formation timeout as a Duration
    pub fn timeout(&self) -> Duration {
        debug!(timeout_secs = %self.timeout_secs, "FormationConfig::timeout: called");
        Duration::from_secs(self.timeout_secs)
    }

    /// Shutdown grace period as a Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
