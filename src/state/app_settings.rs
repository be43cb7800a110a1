use anyhow::{Context, Result};
use log::{LevelFilter, warn};
use std::str::FromStr;
use std::time::Duration;

/// Caller-side retry for fetches that ended on the sample feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total fetch attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the zero-based `attempt` failed: `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    /// How often the background refresher asks for a reload.
    pub refresh_interval: Duration,
    /// Loaded data older than this should trigger a background reload on read.
    pub stale_after: Duration,
    pub retry: RetryPolicy,
    pub log_level: Option<LevelFilter>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5 * 60),
            stale_after: Duration::from_secs(2 * 60),
            retry: RetryPolicy::default(),
            log_level: None,
        }
    }
}

impl AppSettings {
    /// Settings from the environment, falling back to defaults if any
    /// variable is malformed.
    pub fn load() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            warn!("ignoring environment settings: {e:#}");
            Self::default()
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads `YENITV_REFRESH_SECS`, `YENITV_STALE_SECS`,
    /// `YENITV_RETRY_ATTEMPTS` and `YENITV_LOG` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(secs) = get("YENITV_REFRESH_SECS") {
            settings.refresh_interval = parse_secs(&secs).context("YENITV_REFRESH_SECS")?;
        }
        if let Some(secs) = get("YENITV_STALE_SECS") {
            settings.stale_after = parse_secs(&secs).context("YENITV_STALE_SECS")?;
        }
        if let Some(attempts) = get("YENITV_RETRY_ATTEMPTS") {
            settings.retry.max_attempts = attempts
                .trim()
                .parse::<u32>()
                .with_context(|| format!("YENITV_RETRY_ATTEMPTS: invalid count {attempts:?}"))?
                .max(1);
        }
        if let Some(level) = get("YENITV_LOG") {
            settings.log_level = Some(
                LevelFilter::from_str(level.trim())
                    .map_err(|_| anyhow::anyhow!("YENITV_LOG: unknown level {level:?}"))?,
            );
        }
        Ok(settings)
    }
}

fn parse_secs(raw: &str) -> Result<Duration> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("invalid number of seconds {raw:?}"))?;
    anyhow::ensure!(secs > 0, "interval must be positive");
    Ok(Duration::from_secs(secs))
}
