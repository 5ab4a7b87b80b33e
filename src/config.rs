//! Configuration management for the bridge.
//!
//! Settings are loaded from an optional TOML file layered over built-in
//! defaults, using the `config` crate. All durations accept humantime
//! strings ("1s", "500ms", "2min").
//!
//! ```toml
//! max_retries = 5
//! retry_delay = "1s"
//! poll_interval = "2s"
//! running_timeout = "60s"
//! log_level = "info"
//! ```

use crate::error::BridgeResult;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Tunable parameters for the session startup and wait protocol.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeSettings {
    /// Maximum number of attempts to open the measurement configuration.
    pub max_retries: u32,
    /// Delay between failed open attempts.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Interval between polls of the engine's running flag.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Upper bound on the wait for the measurement to report running.
    #[serde(with = "humantime_serde")]
    pub running_timeout: Duration,
    /// Log level hint for embedding applications ("trace" .. "error").
    pub log_level: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(2),
            running_timeout: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl BridgeSettings {
    /// Load settings from a TOML file, falling back to defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let s = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()?;

        Ok(s.try_deserialize()?)
    }
}
