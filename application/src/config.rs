//! [`Config`]-related definitions.

use std::{path::PathBuf, time};

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use service::infra::{feed, retry, shift};
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SHiFT website configuration.
    pub shift: Shift,

    /// Codes feed configuration.
    pub feed: Feed,

    /// Service tasks configuration.
    pub tasks: Tasks,

    /// Persistent store configuration.
    pub store: Store,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// SHiFT website configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Shift {
    /// Origin of the SHiFT website.
    #[default(shift::DEFAULT_BASE_URL.to_owned())]
    pub base_url: String,

    /// Minimal delay between consecutive code checks and redemptions.
    #[default(time::Duration::from_secs(3))]
    #[serde(with = "humantime_serde")]
    pub request_delay: time::Duration,

    /// Delay before retrying a rate-limited request.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub rate_limit_delay: time::Duration,

    /// Number of retries of a rate-limited request.
    #[default(3)]
    pub rate_limit_retries: u32,

    /// Assumed lifetime of a new session.
    #[default(time::Duration::from_secs(365 * 24 * 60 * 60))]
    #[serde(with = "humantime_serde")]
    pub session_lifetime: time::Duration,

    /// Timeout of a single request.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub request_timeout: time::Duration,
}

impl From<Shift> for shift::Config {
    fn from(value: Shift) -> Self {
        let Shift {
            base_url,
            request_delay,
            rate_limit_delay,
            rate_limit_retries,
            session_lifetime,
            request_timeout,
        } = value;
        Self {
            base_url,
            request_delay,
            rate_limit_delay,
            rate_limit_retries,
            session_lifetime,
            request_timeout,
        }
    }
}

/// Codes feed configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Feed {
    /// URL of the published codes.
    #[default(feed::DEFAULT_URL.to_owned())]
    pub url: String,

    /// Timeout of a single request.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,

    /// Retrying of failed requests.
    pub retry: Retry,
}

impl From<Feed> for feed::Config {
    fn from(value: Feed) -> Self {
        let Feed {
            url,
            timeout,
            retry,
        } = value;
        Self {
            url,
            timeout,
            backoff: retry.into(),
        }
    }
}

/// Retrying configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Retry {
    /// Maximum number of attempts.
    #[default(3)]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[default(time::Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub initial_delay: time::Duration,

    /// Upper bound of a delay.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub max_delay: time::Duration,

    /// Multiplier of the delay after each retry.
    #[default(2.0)]
    pub factor: f64,
}

impl From<Retry> for retry::Backoff {
    fn from(value: Retry) -> Self {
        let Retry {
            max_attempts,
            initial_delay,
            max_delay,
            factor,
        } = value;
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            factor,
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tasks {
    /// `AutoRedeem` task configuration.
    pub auto_redeem: AutoRedeem,
}

impl From<Tasks> for service::Config {
    fn from(value: Tasks) -> Self {
        let Tasks {
            auto_redeem:
                AutoRedeem {
                    poll_interval,
                    start_delay,
                },
        } = value;
        Self {
            auto_redeem: service::task::auto_redeem::Config {
                poll_interval,
                start_delay,
            },
            run_lock: None,
        }
    }
}

/// `AutoRedeem` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct AutoRedeem {
    /// Interval between checks whether a run is due.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub poll_interval: time::Duration,

    /// Delay before the first check.
    #[default(time::Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub start_delay: time::Duration,
}

/// Persistent store configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Store {
    /// Path to the JSON document holding the persisted state.
    #[default(PathBuf::from("shift-redeemer.json"))]
    pub path: PathBuf,
}

impl Store {
    /// Returns the path to the file locked by redemption runs, next to the
    /// [`Store::path`].
    #[must_use]
    pub fn run_lock(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".run.lock");
        path.into()
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use super::{Config, LogLevel};

    #[test]
    fn defaults_without_file() {
        let config = Config::new("does-not-exist.toml").unwrap();

        assert_eq!(config.shift.request_delay, Duration::from_secs(3));
        assert_eq!(config.tasks.auto_redeem.poll_interval, Duration::from_secs(30));
        assert_eq!(config.feed.retry.max_attempts, 3);
        assert!(matches!(config.log.level, LogLevel::Info));
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [shift]
            request_delay = "500ms"
            rate_limit_retries = 5

            [tasks.auto_redeem]
            start_delay = "1m"

            [store]
            path = "/var/lib/shift/store.json"

            [log]
            level = "DEBUG"
            "#,
        )
        .unwrap();

        let config = Config::new(path.to_str().unwrap()).unwrap();

        assert_eq!(config.shift.request_delay, Duration::from_millis(500));
        assert_eq!(config.shift.rate_limit_retries, 5);
        assert_eq!(
            config.tasks.auto_redeem.start_delay,
            Duration::from_secs(60),
        );
        assert_eq!(config.store.path.to_str(), Some("/var/lib/shift/store.json"));
        assert_eq!(
            config.store.run_lock().to_str(),
            Some("/var/lib/shift/store.json.run.lock"),
        );
        assert!(matches!(config.log.level, LogLevel::Debug));

        let shift: service::infra::shift::Config = config.shift.into();
        assert_eq!(shift.rate_limit_retries, 5);
    }
}
