//! Bot configuration parsed from the `JIRABOT_CONFIG` environment string.

use std::{net::SocketAddr, ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::debug;

use super::types::Res;

/// Name of the environment variable holding the raw configuration JSON.
pub const CONFIG_ENV_VAR: &str = "JIRABOT_CONFIG";

/// Default path of the keybase binary.
fn default_keybase_binary() -> String {
    "keybase".to_string()
}

/// Default bind address for the HTTP listener.
fn default_http_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Default datastore endpoint.
fn default_db_endpoint() -> String {
    "memory".to_string()
}

/// Default interval between Jira feed polls.
fn default_feed_poll_interval() -> Duration {
    Duration::from_secs(60)
}

/// Validated configuration for the jirabot process.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared inner configuration.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The deserialized configuration document.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Keybase identity the bot runs as (`keybase`).
    pub keybase: KeybaseConfig,
    /// Jira connection settings (`jira`).
    pub jira: JiraConfig,
    /// Bind address for the HTTP listener (`http_address`).
    #[serde(default = "default_http_address")]
    pub http_address: SocketAddr,
    /// Datastore settings (`db`).
    #[serde(default)]
    pub db: DbConfig,
    /// Interval between Jira feed polls, in seconds (`feed_poll_interval`).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_feed_poll_interval")]
    pub feed_poll_interval: Duration,
}

/// Keybase identity settings.
#[derive(Debug, Deserialize, Clone)]
pub struct KeybaseConfig {
    /// Bot account username (`keybase.username`).
    pub username: String,
    /// Paper key used to provision the bot device (`keybase.paperkey`).
    pub paperkey: String,
    /// Path of the keybase binary (`keybase.binary`).
    #[serde(default = "default_keybase_binary")]
    pub binary: String,
}

/// Jira connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    /// Base URL of the Jira instance (`jira.base_url`).
    pub base_url: String,
    /// Account email for basic auth (`jira.email`).
    pub email: String,
    /// API token for basic auth (`jira.api_token`).
    pub api_token: String,
    /// Project used when neither the command nor the channel names one (`jira.default_project`).
    #[serde(default)]
    pub default_project: Option<String>,
}

/// Datastore settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Datastore endpoint (`db.endpoint`); `memory` runs in-process.
    #[serde(default = "default_db_endpoint")]
    pub endpoint: String,
    /// Datastore username (`db.username`).
    #[serde(default)]
    pub username: Option<String>,
    /// Datastore password (`db.password`).
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            keybase: KeybaseConfig::default(),
            jira: JiraConfig::default(),
            http_address: default_http_address(),
            db: DbConfig::default(),
            feed_poll_interval: default_feed_poll_interval(),
        }
    }
}

impl Default for KeybaseConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            paperkey: String::new(),
            binary: default_keybase_binary(),
        }
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: String::new(),
            api_token: String::new(),
            default_project: None,
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: default_db_endpoint(),
            username: None,
            password: None,
        }
    }
}

impl Config {
    /// Parse the raw configuration string.
    ///
    /// Any failure yields `None`: empty input, malformed JSON, an unknown
    /// schema, or an out-of-bounds value are all indistinguishable to the
    /// caller. The cause is only logged at debug severity.
    pub fn parse(raw: &str) -> Option<Self> {
        match Self::try_parse(raw) {
            Ok(config) => Some(config),
            Err(err) => {
                debug!("Rejected bot-config: {}", err);
                None
            }
        }
    }

    fn try_parse(raw: &str) -> Res<Self> {
        let inner: ConfigInner = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Json))
            .build()?
            .try_deserialize()?;

        let result = Config { inner: Arc::new(inner) };

        if !result.jira.base_url.starts_with("http://") && !result.jira.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("Jira base URL must be http(s)."));
        }

        if result.jira.email.is_empty() || result.jira.api_token.is_empty() {
            return Err(anyhow::anyhow!("Jira email and API token are required."));
        }

        if result.keybase.username.is_empty() || result.keybase.paperkey.is_empty() {
            return Err(anyhow::anyhow!("Keybase username and paperkey are required."));
        }

        let seconds = result.feed_poll_interval.as_secs();
        if !(5..=3600).contains(&seconds) {
            return Err(anyhow::anyhow!("Feed poll interval must be between 5 and 3600 seconds."));
        }

        Ok(result)
    }
}
