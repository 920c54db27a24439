use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use tracing::info;

pub struct Config {
    pub api_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_quiet_period: Duration,
    pub refresh_delay: Duration,
    pub cache_capacity: usize,
    pub apply_server_tallies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(60),
            poll_quiet_period: Duration::from_millis(3_000),
            refresh_delay: Duration::from_millis(2_000),
            cache_capacity: 8,
            apply_server_tallies: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_url: try_load(&lookup, "LEADERBOARD_API_URL", "http://localhost:8080")?,
            request_timeout: Duration::from_secs(try_load(&lookup, "LEADERBOARD_TIMEOUT_SECS", "30")?),
            poll_interval: Duration::from_secs(try_load(&lookup, "LEADERBOARD_POLL_SECS", "60")?),
            poll_quiet_period: Duration::from_millis(try_load(
                &lookup,
                "LEADERBOARD_POLL_QUIET_MS",
                "3000",
            )?),
            refresh_delay: Duration::from_millis(try_load(
                &lookup,
                "LEADERBOARD_REFRESH_DELAY_MS",
                "2000",
            )?),
            cache_capacity: try_load(&lookup, "LEADERBOARD_CACHE_CAPACITY", "8")?,
            apply_server_tallies: try_load(&lookup, "LEADERBOARD_APPLY_SERVER_TALLIES", "true")?,
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}
