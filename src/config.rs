use crate::rate_limit::MinInterval;
use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.mymemory.translated.net/get";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Translation service
    pub translate_api_url: String,
    pub rate_limit: Duration,
    pub max_attempts: u32,
    pub request_timeout: Option<Duration>,

    // Settle delays
    pub language_settle: Duration,
    pub mutation_settle: Duration,
    pub navigation_settle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            translate_api_url: DEFAULT_API_URL.to_string(),
            rate_limit: Duration::from_millis(150),
            max_attempts: 1,
            request_timeout: None,
            language_settle: Duration::from_millis(100),
            mutation_settle: Duration::from_millis(300),
            navigation_settle: Duration::from_millis(300),
        }
    }
}

/// Delays applied between a trigger and the pass it schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySettings {
    pub language_settle: Duration,
    pub mutation_settle: Duration,
    pub navigation_settle: Duration,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Config::default().overlay_settings()
    }
}

impl OverlaySettings {
    /// No settle delays at all
    pub fn immediate() -> Self {
        Self {
            language_settle: Duration::ZERO,
            mutation_settle: Duration::ZERO,
            navigation_settle: Duration::ZERO,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (environment, tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                Some(value) => {
                    let ms: u64 = value
                        .trim()
                        .parse()
                        .with_context(|| format!("{} must be a number of milliseconds", key))?;
                    Ok(Duration::from_millis(ms))
                }
                None => Ok(default),
            }
        };

        let max_attempts = match lookup("TRANSLATE_MAX_ATTEMPTS") {
            Some(value) => {
                let attempts: u32 = value
                    .trim()
                    .parse()
                    .context("TRANSLATE_MAX_ATTEMPTS must be a positive integer")?;
                if attempts == 0 {
                    anyhow::bail!("TRANSLATE_MAX_ATTEMPTS must be at least 1");
                }
                attempts
            }
            None => defaults.max_attempts,
        };

        let request_timeout = match lookup("TRANSLATE_TIMEOUT_SECS") {
            Some(value) => Some(Duration::from_secs(
                value
                    .trim()
                    .parse()
                    .context("TRANSLATE_TIMEOUT_SECS must be a number of seconds")?,
            )),
            None => None,
        };

        Ok(Self {
            translate_api_url: lookup("TRANSLATE_API_URL").unwrap_or(defaults.translate_api_url),
            rate_limit: millis("TRANSLATE_RATE_LIMIT_MS", defaults.rate_limit)?,
            max_attempts,
            request_timeout,
            language_settle: millis("LANGUAGE_SETTLE_MS", defaults.language_settle)?,
            mutation_settle: millis("MUTATION_SETTLE_MS", defaults.mutation_settle)?,
            navigation_settle: millis("NAVIGATION_SETTLE_MS", defaults.navigation_settle)?,
        })
    }

    pub fn overlay_settings(&self) -> OverlaySettings {
        OverlaySettings {
            language_settle: self.language_settle,
            mutation_settle: self.mutation_settle,
            navigation_settle: self.navigation_settle,
        }
    }

    pub fn rate_limiter(&self) -> MinInterval {
        MinInterval::new(self.rate_limit)
    }
}
