use std::time::Duration;

use plexrec_core::RecommendationsClient;
use serde::Deserialize;

use crate::error::SetupError;

/// Prefix of every environment variable read by [`Config::from_env`].
pub const ENV_PREFIX: &str = "PLEXREC_";

/// Integration configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the recommendation API
    pub api_url: String,

    /// Value of the `X-API-Key` header, if the API requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Seconds between roster polls
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Timeout for the roster and health requests
    #[serde(default = "default_roster_timeout")]
    pub roster_timeout_secs: u64,

    /// Timeout for per-user list requests. The upstream warms a cache on
    /// the first call, so this is generous.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Upper bound of the random delay before an entity's first fetch; 0
    /// disables it
    #[serde(default = "default_startup_jitter")]
    pub startup_jitter_secs: u64,
}

fn default_scan_interval() -> u64 {
    3600
}

fn default_roster_timeout() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_startup_jitter() -> u64 {
    5
}

impl Config {
    /// Configuration for `api_url` with every other setting at its default.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            scan_interval_secs: default_scan_interval(),
            roster_timeout_secs: default_roster_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            startup_jitter_secs: default_startup_jitter(),
        }
    }

    /// Load configuration from `PLEXREC_*` environment variables, after
    /// reading a `.env` file if one exists.
    pub fn from_env() -> Result<Self, SetupError> {
        dotenvy::dotenv().ok();
        let config = envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .map_err(|e| SetupError::Config(format!("Failed to load config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(SetupError::Config("api_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SetupError::Config(format!(
                "api_url must start with http:// or https://, got {url}"
            )));
        }
        if self.scan_interval_secs == 0 {
            return Err(SetupError::Config("scan_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn client(&self) -> RecommendationsClient {
        RecommendationsClient::new(self.api_url.trim(), self.api_key.as_deref())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn roster_timeout(&self) -> Duration {
        Duration::from_secs(self.roster_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn startup_jitter(&self) -> Duration {
        Duration::from_secs(self.startup_jitter_secs)
    }
}
