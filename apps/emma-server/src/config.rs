//! Server configuration types and loading.
//!
//! Defines [`ServerConfig`], assembled from an optional YAML file
//! (`~/.emma-server/config.yml` by default) overlaid with environment
//! variables. Contains the Slack credentials, the bot's own user id and the
//! HTTP listener settings.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ServerError;

/// Base URL for the Slack Web API.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Default listener port.
pub const DEFAULT_PORT: u16 = 5000;

const DEFAULT_BIND: &str = "0.0.0.0";

/// Slack stops retrying a delivery after about five minutes.
const DEFAULT_DEDUP_TTL_SECS: u64 = 600;

/// Top-level server configuration.
///
/// # Examples
///
/// ```
/// use emma_server::config::ServerConfig;
///
/// let yaml = r#"
/// slack:
///   bot_token: "xoxb-test"
///   signing_secret: "s3cr3t"
///   bot_user_id: "UBOT"
/// server:
///   port: 8080
/// "#;
///
/// let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!(config.slack.bot_user_id, "UBOT");
/// assert_eq!(config.server.port, 8080);
/// assert_eq!(config.server.bind, "0.0.0.0");
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Slack credentials and API endpoint.
    #[serde(default)]
    pub slack: SlackConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: HttpConfig,
}

/// Slack credentials and API endpoint.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot User OAuth Token for Web API calls (`xoxb-...`).
    pub bot_token: String,

    /// Request signing secret. Loaded and required, but not checked against
    /// inbound requests.
    pub signing_secret: String,

    /// The bot's own user id, used to ignore its own messages.
    pub bot_user_id: String,

    /// Web API base URL, overridable for testing against a local mock.
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            signing_secret: String::new(),
            bot_user_id: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("signing_secret", &redact(&self.signing_secret))
            .field("bot_user_id", &self.bot_user_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Interface address to bind.
    pub bind: String,

    /// TCP port to listen on.
    pub port: u16,

    /// How long a delivered `event_id` is remembered for retry suppression.
    pub dedup_ttl_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            dedup_ttl_secs: DEFAULT_DEDUP_TTL_SECS,
        }
    }
}

/// Returns the default configuration directory path (`~/.emma-server/`).
///
/// # Errors
///
/// Returns `ServerError::Config` if the `HOME` environment variable is not set.
pub fn default_config_dir() -> Result<PathBuf, ServerError> {
    let home = std::env::var("HOME")
        .map_err(|_| ServerError::Config("HOME environment variable not set".into()))?;
    Ok(PathBuf::from(home).join(".emma-server"))
}

/// Returns the default configuration file path (`~/.emma-server/config.yml`).
///
/// # Errors
///
/// Returns `ServerError::Config` if the `HOME` environment variable is not set.
pub fn default_config_path() -> Result<PathBuf, ServerError> {
    Ok(default_config_dir()?.join("config.yml"))
}

impl ServerConfig {
    /// Loads configuration from all layers and validates the result.
    ///
    /// An explicit `path` must exist. Without one, the default path is read
    /// only if present. Environment variables are applied on top of the
    /// file values.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the file cannot be read or parsed,
    /// an environment value is malformed, or a required secret is missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        Self::load_from(path, default_config_path().ok(), |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with the default file path and the environment
    /// lookup supplied by the caller.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_from<F>(
        path: Option<&Path>,
        default_path: Option<PathBuf>,
        lookup: F,
    ) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path.filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using environment only");
                    Self::default()
                }
            },
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the YAML file layer without validating it.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the file cannot be read or contains
    /// invalid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        info!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("Cannot read config at {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            ServerError::Config(format!("Invalid YAML in config at {}: {e}", path.display()))
        })
    }

    /// Overlays values from environment variables, read through `lookup`.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SLACK_BOT_TOKEN") {
            self.slack.bot_token = v;
        }
        if let Some(v) = get("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = v;
        }
        if let Some(v) = get("SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = v;
        }
        if let Some(v) = get("SLACK_API_BASE") {
            self.slack.api_base = v;
        }
        if let Some(v) = get("EMMA_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("EMMA_PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|e| ServerError::Config(format!("EMMA_PORT={v} is not a port: {e}")))?;
        }
        if let Some(v) = get("EMMA_DEDUP_TTL_SECS") {
            self.server.dedup_ttl_secs = v.trim().parse().map_err(|e| {
                ServerError::Config(format!("EMMA_DEDUP_TTL_SECS={v} is not a number: {e}"))
            })?;
        }
        Ok(())
    }

    /// Validates that every required secret is present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` naming every missing setting.
    pub fn validate(&self) -> Result<(), ServerError> {
        let missing: Vec<&str> = [
            ("SLACK_BOT_TOKEN", &self.slack.bot_token),
            ("SLACK_SIGNING_SECRET", &self.slack.signing_secret),
            ("SLACK_BOT_USER_ID", &self.slack.bot_user_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ServerError::Config(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )));
        }
        if !self.slack.bot_token.starts_with("xoxb-") {
            return Err(ServerError::Config(
                "SLACK_BOT_TOKEN must start with 'xoxb-'".into(),
            ));
        }
        Ok(())
    }

    /// Resolves the listener address from `bind` and `port`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if `bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip: IpAddr = self.server.bind.parse().map_err(|e| {
            ServerError::Config(format!("bind address '{}' is invalid: {e}", self.server.bind))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Retention window for seen event ids.
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.server.dedup_ttl_secs)
    }
}
