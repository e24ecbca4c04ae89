use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub port: u16,
    pub provider_url: String,
    pub provider_token: Option<String>,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub reconcile_window: Duration,
    pub retention: Duration,
    pub handoff_ttl: Duration,
    pub state_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            provider_url: "http://127.0.0.1:8000/api".to_string(),
            provider_token: None,
            poll_interval: Duration::from_secs(5),
            max_attempts: 120,
            reconcile_window: Duration::from_secs(60),
            retention: Duration::from_secs(168 * 3600),
            handoff_ttl: Duration::from_secs(15 * 60),
            state_dir: PathBuf::from("outputs/state"),
        }
    }
}

impl OrchestratorConfig {
    /// Load `.env` if present, then read overrides from the environment.
    pub fn load() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Build a config from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            port: parse(&lookup, "PORT", "a port number")?.unwrap_or(defaults.port),
            provider_url: lookup("GENQ_PROVIDER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.provider_url),
            provider_token: lookup("GENQ_PROVIDER_TOKEN").filter(|t| !t.is_empty()),
            poll_interval: parse(&lookup, "GENQ_POLL_INTERVAL_SECS", "a number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_attempts: match parse::<u32, _>(&lookup, "GENQ_MAX_ATTEMPTS", "a positive integer")? {
                Some(0) => {
                    return Err(ConfigError::Invalid {
                        key: "GENQ_MAX_ATTEMPTS",
                        expected: "a positive integer",
                        value: "0".to_string(),
                    })
                }
                Some(n) => n,
                None => defaults.max_attempts,
            },
            reconcile_window: parse(&lookup, "GENQ_RECONCILE_WINDOW_SECS", "a number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_window),
            retention: parse::<u64, _>(&lookup, "GENQ_RETENTION_HOURS", "a number of hours")?
                .map(|h| Duration::from_secs(h * 3600))
                .unwrap_or(defaults.retention),
            handoff_ttl: parse(&lookup, "GENQ_HANDOFF_TTL_SECS", "a number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.handoff_ttl),
            state_dir: lookup("GENQ_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
        })
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.state_dir.join("jobs.json")
    }

    pub fn handoff_dir(&self) -> PathBuf {
        self.state_dir.join("handoff")
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, expected, value }),
    }
}
