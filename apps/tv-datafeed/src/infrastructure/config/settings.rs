//! Datafeed Configuration Settings
//!
//! Configuration types for the downloader, loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::JobSettings;
use crate::domain::history::SessionKind;
use crate::domain::replay::ReplayWindow;
use crate::domain::symbol::Contract;

/// Production chart websocket.
pub const DEFAULT_WS_URL: &str = "wss://prodata.tradingview.com/socket.io/websocket";

/// Account credentials.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Chart socket settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Websocket endpoint.
    pub url: String,
    /// Connect (and HTTP request) timeout.
    pub connect_timeout: Duration,
    /// Longest wait for a single message.
    pub read_timeout: Duration,
    /// Overall limit for one download (`None` = unbounded).
    pub deadline: Option<Duration>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            deadline: None,
        }
    }
}

/// What the binary does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Download history for the configured symbols.
    History(JobSettings),
    /// Print symbol search results.
    Search {
        /// Free-text query.
        text: String,
        /// Exchange filter (may be empty).
        exchange: String,
    },
}

/// Complete downloader configuration.
#[derive(Debug, Clone)]
pub struct DatafeedConfig {
    /// Sign-in credentials, if any.
    pub credentials: Option<Credentials>,
    /// Chart socket settings.
    pub stream: StreamSettings,
    /// Root directory for CSV output.
    pub output_dir: PathBuf,
    /// Selected mode.
    pub mode: RunMode,
}

impl DatafeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let credentials = match (env.get("TV_USERNAME"), env.get("TV_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("TV_PASSWORD".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("TV_USERNAME".to_string())),
        };

        let defaults = StreamSettings::default();
        let stream = StreamSettings {
            url: env.get("TV_WS_URL").unwrap_or(defaults.url),
            connect_timeout: env
                .parse::<u64>("TV_CONNECT_TIMEOUT_SECS")?
                .map_or(defaults.connect_timeout, Duration::from_secs),
            read_timeout: env
                .parse::<u64>("TV_READ_TIMEOUT_SECS")?
                .map_or(defaults.read_timeout, Duration::from_secs),
            deadline: env.parse::<u64>("TV_DEADLINE_SECS")?.map(Duration::from_secs),
        };

        let output_dir = env
            .get("TV_OUTPUT_DIR")
            .map_or_else(|| PathBuf::from("historical-data"), PathBuf::from);

        let job_defaults = JobSettings::default();
        let exchange = env.get("TV_EXCHANGE").unwrap_or(job_defaults.exchange);

        let mode = if let Some(text) = env.get("TV_SEARCH") {
            RunMode::Search { text, exchange }
        } else {
            let symbols: Vec<String> = env
                .require("TV_SYMBOLS")?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if symbols.is_empty() {
                return Err(ConfigError::EmptyValue("TV_SYMBOLS".to_string()));
            }

            let replay = match (env.get("TV_START_DATE"), env.get("TV_END_DATE")) {
                (Some(start), Some(end)) => Some(
                    ReplayWindow::parse(&start, &end)
                        .map_err(|e| ConfigError::invalid("TV_START_DATE/TV_END_DATE", e))?,
                ),
                (None, None) => None,
                _ => {
                    return Err(ConfigError::invalid(
                        "TV_START_DATE/TV_END_DATE",
                        "both dates must be set for replay",
                    ));
                }
            };

            RunMode::History(JobSettings {
                symbols,
                exchange,
                interval: env.parse("TV_INTERVAL")?.unwrap_or(job_defaults.interval),
                n_bars: env.parse("TV_BARS")?.unwrap_or(job_defaults.n_bars),
                contract: env.get("TV_FUT_CONTRACT").map(|raw| Contract::parse(&raw)),
                session: env
                    .parse_bool("TV_EXTENDED_SESSION")?
                    .map_or(job_defaults.session, SessionKind::from_extended),
                replay,
            })
        };

        Ok(Self {
            credentials,
            stream,
            output_dir,
            mode,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Lookup wrapper; blank values count as unset.
struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        match (self.0)(key) {
            None => Err(ConfigError::MissingEnvVar(key.to_string())),
            Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(v) => Ok(v),
        }
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|v| v.parse::<T>().map_err(|e| ConfigError::invalid(key, e)))
            .transpose()
    }

    fn parse_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get(key)
            .map(|v| match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(key, format!("not a boolean: {v}"))),
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::bars::Interval;

    fn config(vars: &[(&str, &str)]) -> Result<DatafeedConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        DatafeedConfig::from_lookup(|key| map.get(key).cloned())
    }

    fn job(config: &DatafeedConfig) -> &JobSettings {
        match &config.mode {
            RunMode::History(job) => job,
            RunMode::Search { .. } => panic!("expected history mode"),
        }
    }

    #[test]
    fn defaults() {
        let config = config(&[("TV_SYMBOLS", "NIFTY")]).unwrap();
        assert!(config.credentials.is_none());
        assert_eq!(config.stream.url, DEFAULT_WS_URL);
        assert_eq!(config.stream.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.stream.read_timeout, Duration::from_secs(5));
        assert_eq!(config.stream.deadline, None);
        assert_eq!(config.output_dir, PathBuf::from("historical-data"));

        let job = job(&config);
        assert_eq!(job.symbols, vec!["NIFTY"]);
        assert_eq!(job.exchange, "NSE");
        assert_eq!(job.interval, Interval::Daily);
        assert_eq!(job.n_bars, 10);
        assert_eq!(job.session, SessionKind::Regular);
        assert!(job.replay.is_none());
    }

    #[test]
    fn full_job() {
        let config = config(&[
            ("TV_USERNAME", "trader"),
            ("TV_PASSWORD", "hunter2"),
            ("TV_SYMBOLS", "NASDAQ:NVDA, NASDAQ:AAPL,,"),
            ("TV_INTERVAL", "1S"),
            ("TV_BARS", "5000"),
            ("TV_EXTENDED_SESSION", "true"),
            ("TV_START_DATE", "2024-12-18"),
            ("TV_END_DATE", "2024-12-10"),
            ("TV_DEADLINE_SECS", "600"),
            ("TV_FUT_CONTRACT", "1"),
        ])
        .unwrap();

        assert_eq!(config.credentials.as_ref().unwrap().username(), "trader");
        assert_eq!(config.stream.deadline, Some(Duration::from_secs(600)));
        let job = job(&config);
        assert_eq!(job.symbols, vec!["NASDAQ:NVDA", "NASDAQ:AAPL"]);
        assert_eq!(job.interval, Interval::Second1);
        assert_eq!(job.n_bars, 5000);
        assert_eq!(job.session, SessionKind::Extended);
        assert_eq!(job.contract, Some(Contract::Continuous(1)));
        assert!(job.replay.is_some());
    }

    #[test]
    fn search_mode() {
        let config = config(&[("TV_SEARCH", "NIFTY"), ("TV_EXCHANGE", "NSE")]).unwrap();
        assert_eq!(
            config.mode,
            RunMode::Search {
                text: "NIFTY".into(),
                exchange: "NSE".into()
            }
        );
    }

    #[test]
    fn missing_symbols() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingEnvVar(k)) if k == "TV_SYMBOLS"));
        assert!(matches!(
            config(&[("TV_SYMBOLS", " , ")]),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test]
    fn invalid_values() {
        for (key, value) in [
            ("TV_BARS", "lots"),
            ("TV_INTERVAL", "7m"),
            ("TV_READ_TIMEOUT_SECS", "-1"),
            ("TV_EXTENDED_SESSION", "maybe"),
        ] {
            let result = config(&[("TV_SYMBOLS", "NIFTY"), (key, value)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key != "TV_START_DATE/TV_END_DATE"),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn replay_dates_must_pair_and_parse() {
        let bad_date = config(&[
            ("TV_SYMBOLS", "NIFTY"),
            ("TV_START_DATE", "2024-13-01"),
            ("TV_END_DATE", "2024-12-01"),
        ]);
        assert!(matches!(bad_date, Err(ConfigError::InvalidValue { .. })));

        let half = config(&[("TV_SYMBOLS", "NIFTY"), ("TV_END_DATE", "2024-12-01")]);
        assert!(matches!(half, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn half_credentials_rejected() {
        assert!(matches!(
            config(&[("TV_SYMBOLS", "X"), ("TV_USERNAME", "u")]),
            Err(ConfigError::MissingEnvVar(k)) if k == "TV_PASSWORD"
        ));
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("trader".to_string(), "hunter2".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
