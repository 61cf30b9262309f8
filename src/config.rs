use {
    crate::types::SamplePolicy,
    serde::{Deserialize, Serialize},
    std::{io::ErrorKind, time::Duration},
    tracing::info,
};

/// Longest accepted lookback, lag or batch distance.
pub const MAX_WINDOW_SPAN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    // Couchbase query service, e.g. http://localhost:8093
    pub server_url: String,

    // Server-side statement timeout, forwarded with every request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    // Client-side HTTP timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    pub username: Option<String>,
    pub password: Option<String>,

    // Metrics selected by the window query
    pub metrics: Vec<String>,

    // Overrides the generated window statement; must bind $start and $end
    pub statement: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    // How far back the window starts
    #[serde(with = "humantime_serde")]
    pub lookback: Duration,

    // Trailing lag that gives the store time to index recent writes
    #[serde(with = "humantime_serde")]
    pub lag: Duration,

    // Lower bound distance for batch queries
    #[serde(with = "humantime_serde")]
    pub batch_diff: Duration,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    #[serde(default)]
    pub sample_policy: SamplePolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(90),
            lag: Duration::from_secs(30),
            batch_diff: Duration::from_secs(600),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8093".to_string(),
            timeout: Duration::from_secs(1000),
            request_timeout: Duration::from_secs(1010), // outlive the server timeout
            username: None,
            password: None,
            metrics: [
                "join_ack_time",
                "ws_create_time",
                "chaal_time_new",
                "player_load",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            statement: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults. Any
    /// other failure is returned.
    pub fn load_or_default(path: &str) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path);
                Ok(config)
            }
            Err(ConfigError::FileReadError(e)) if e.kind() == ErrorKind::NotFound => {
                info!("Config file {} not found, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.server_url.is_empty() {
            return Err(ConfigError::Invalid("Empty server_url".into()));
        }
        if self.query.statement.is_none() && self.query.metrics.is_empty() {
            return Err(ConfigError::Invalid(
                "No metrics configured and no statement override".into(),
            ));
        }
        if self.window.lag > self.window.lookback {
            return Err(ConfigError::Invalid(format!(
                "Window lag {:?} exceeds lookback {:?}",
                self.window.lag, self.window.lookback
            )));
        }
        for (name, span) in [
            ("lookback", self.window.lookback),
            ("lag", self.window.lag),
            ("batch_diff", self.window.batch_diff),
        ] {
            if span > MAX_WINDOW_SPAN {
                return Err(ConfigError::Invalid(format!(
                    "Window {name} {span:?} exceeds {MAX_WINDOW_SPAN:?}"
                )));
            }
        }
        Ok(())
    }
}
