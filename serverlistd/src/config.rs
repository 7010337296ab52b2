use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{bail, Context, Result};
use shared::types::Address;
use crate::orchestrator::QuerySettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub query: QueryConfig,
    #[serde(default)]
    pub presenter: PresenterConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Fixed server list. Disables master server discovery when non-empty.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Game directory used for master server discovery, e.g. "cstrike"
    pub game_dir: Option<String>,
    /// Discovered addresses to skip. A bare host skips every port.
    #[serde(default)]
    pub blacklist: Vec<String>,
    pub webapi_key: Option<String>,
    #[serde(default = "default_query_interval")]
    pub query_interval_secs: f64,
    #[serde(default = "default_directory_query_interval")]
    pub directory_query_interval_secs: f64,
    /// Negative keeps unresponsive servers forever
    #[serde(default = "default_max_unresponsive")]
    pub max_unresponsive_secs: f64,
    #[serde(default = "default_max_total_query_time")]
    pub max_total_query_time_secs: f64,
    #[serde(default = "default_max_directory_query_time")]
    pub max_directory_query_time_secs: f64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: f64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
    #[serde(default = "default_directory_limit")]
    pub directory_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenterConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_upper_format")]
    pub upper_format: String,
    #[serde(default = "default_lower_format")]
    pub lower_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_query_interval() -> f64 {
    30.0
}

fn default_directory_query_interval() -> f64 {
    100.0
}

fn default_max_unresponsive() -> f64 {
    60.0
}

fn default_max_total_query_time() -> f64 {
    30.0
}

fn default_max_directory_query_time() -> f64 {
    30.0
}

fn default_tick_interval() -> f64 {
    3.0
}

fn default_request_timeout() -> f64 {
    5.0
}

fn default_directory_limit() -> u32 {
    5000
}

fn default_title() -> String {
    "Servers".to_string()
}

fn default_max_entries() -> usize {
    5
}

fn default_upper_format() -> String {
    "{name}".to_string()
}

fn default_lower_format() -> String {
    "{players}/{max_players} | {map} | {address}".to_string()
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            max_entries: default_max_entries(),
            upper_format: default_upper_format(),
            lower_format: default_lower_format(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Non-positive or non-finite values, and values too small to survive the
/// conversion, fall back to the default. Values too large are an error.
fn positive_secs(field: &str, value: f64, default: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Ok(Duration::from_secs_f64(default));
    }

    let duration = Duration::try_from_secs_f64(value)
        .with_context(|| format!("Invalid query.{}", field))?;
    if duration.is_zero() {
        return Ok(Duration::from_secs_f64(default));
    }

    Ok(duration)
}

fn parse_addresses(field: &str, raw: &[String]) -> Result<Vec<Address>> {
    raw.iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<Address>()
                .with_context(|| format!("Invalid address in query.{}", field))
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)
            .context("Failed to parse config")?;

        config.validate()?;
        config.presenter.max_entries = config.presenter.max_entries.max(1);

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let whitelist = parse_addresses("whitelist", &self.query.whitelist)?;
        if whitelist.is_empty() && non_empty(&self.query.game_dir).is_none() {
            bail!("You must configure one list method, 'query.whitelist' or 'query.game_dir'!");
        }
        if non_empty(&self.query.webapi_key).is_none() {
            bail!("You must configure 'query.webapi_key'!");
        }
        parse_addresses("blacklist", &self.query.blacklist)?;
        self.query.settings()?;
        self.query.tick_interval()?;
        self.query.request_timeout()?;
        Ok(())
    }

    pub fn webapi_key(&self) -> &str {
        non_empty(&self.query.webapi_key).unwrap_or_default()
    }
}

impl QueryConfig {
    /// Typed settings for the orchestrator.
    pub fn settings(&self) -> Result<QuerySettings> {
        let whitelist = parse_addresses("whitelist", &self.whitelist)?;
        let max_unresponsive = if self.max_unresponsive_secs < 0.0 {
            None
        } else {
            Some(
                Duration::try_from_secs_f64(self.max_unresponsive_secs)
                    .context("Invalid query.max_unresponsive_secs")?,
            )
        };

        Ok(QuerySettings {
            whitelist: (!whitelist.is_empty()).then_some(whitelist),
            game_dir: non_empty(&self.game_dir).map(str::to_string),
            blacklist: parse_addresses("blacklist", &self.blacklist)?,
            query_interval: positive_secs(
                "query_interval_secs",
                self.query_interval_secs,
                default_query_interval(),
            )?,
            directory_query_interval: positive_secs(
                "directory_query_interval_secs",
                self.directory_query_interval_secs,
                default_directory_query_interval(),
            )?,
            max_unresponsive,
            max_total_query_time: positive_secs(
                "max_total_query_time_secs",
                self.max_total_query_time_secs,
                default_max_total_query_time(),
            )?,
            max_directory_query_time: positive_secs(
                "max_directory_query_time_secs",
                self.max_directory_query_time_secs,
                default_max_directory_query_time(),
            )?,
        })
    }

    pub fn tick_interval(&self) -> Result<Duration> {
        positive_secs("tick_interval_secs", self.tick_interval_secs, default_tick_interval())
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        positive_secs("request_timeout_secs", self.request_timeout_secs, default_request_timeout())
    }
}
