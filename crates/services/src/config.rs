use std::env;
use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_CONTENT_PATH: &str = "/api/v1/course/content-lesson-progress/update/";
pub const DEFAULT_LESSON_PATH: &str = "/api/v1/course/lesson-progress/update/";

/// Where and how to reach the progress backend.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub content_path: String,
    pub lesson_path: String,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            content_path: DEFAULT_CONTENT_PATH.into(),
            lesson_path: DEFAULT_LESSON_PATH.into(),
        }
    }
}

/// Bounded retry for transient network failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per submission, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Retries without sleeping between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based): exponential with up to 50% jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1_u32 << attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = u64::try_from(backoff.as_millis() / 2).unwrap_or(0);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        backoff + Duration::from_millis(jitter)
    }
}

/// When the background replay loop fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaySchedule {
    pub startup_delay: Duration,
    pub interval: Duration,
    /// Replay passes a queued request may fail before it is dropped.
    pub max_replay_attempts: u32,
}

impl Default for ReplaySchedule {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(5),
            interval: Duration::from_secs(60),
            max_replay_attempts: 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// `None` keeps every update local and queued.
    pub api: Option<ApiConfig>,
    pub language_code: String,
    pub retry: RetryPolicy,
    pub replay: ReplaySchedule,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api: None,
            language_code: DEFAULT_LANGUAGE.into(),
            retry: RetryPolicy::default(),
            replay: ReplaySchedule::default(),
        }
    }
}

impl SyncConfig {
    /// Read configuration from `LINGUIFY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("LINGUIFY_API_BASE_URL") {
            let base_url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
                var: "LINGUIFY_API_BASE_URL",
                raw: raw.clone(),
                source,
            })?;
            let mut api = ApiConfig::new(base_url);
            api.token = get("LINGUIFY_API_TOKEN");
            if let Some(path) = get("LINGUIFY_CONTENT_PROGRESS_PATH") {
                api.content_path = path;
            }
            if let Some(path) = get("LINGUIFY_LESSON_PROGRESS_PATH") {
                api.lesson_path = path;
            }
            config.api = Some(api);
        }

        if let Some(lang) = get("LINGUIFY_LANGUAGE") {
            config.language_code = lang.trim().to_string();
        }

        if let Some(raw) = get("LINGUIFY_MAX_RETRIES") {
            let attempts = parse_number("LINGUIFY_MAX_RETRIES", &raw)?;
            if attempts == 0 {
                return Err(ConfigError::TooSmall {
                    var: "LINGUIFY_MAX_RETRIES",
                    min: 1,
                });
            }
            config.retry.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }

        if let Some(raw) = get("LINGUIFY_STARTUP_DELAY_SECS") {
            config.replay.startup_delay =
                Duration::from_secs(parse_number("LINGUIFY_STARTUP_DELAY_SECS", &raw)?);
        }

        if let Some(raw) = get("LINGUIFY_REPLAY_INTERVAL_SECS") {
            let secs = parse_number("LINGUIFY_REPLAY_INTERVAL_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::TooSmall {
                    var: "LINGUIFY_REPLAY_INTERVAL_SECS",
                    min: 1,
                });
            }
            config.replay.interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.api.is_none());
        assert_eq!(config.language_code, "en");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.replay.interval, Duration::from_secs(60));
    }

    #[test]
    fn reads_api_and_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("LINGUIFY_API_BASE_URL", "https://linguify.example/"),
            ("LINGUIFY_API_TOKEN", "secret"),
            ("LINGUIFY_LANGUAGE", "nl"),
            ("LINGUIFY_MAX_RETRIES", "5"),
            ("LINGUIFY_REPLAY_INTERVAL_SECS", "30"),
        ]))
        .unwrap();
        let api = config.api.unwrap();
        assert_eq!(api.base_url.host_str(), Some("linguify.example"));
        assert_eq!(api.token.as_deref(), Some("secret"));
        assert_eq!(api.lesson_path, DEFAULT_LESSON_PATH);
        assert_eq!(config.language_code, "nl");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.replay.interval, Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[("LINGUIFY_API_BASE_URL", "not a url")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[("LINGUIFY_MAX_RETRIES", "three")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[("LINGUIFY_MAX_RETRIES", "0")])),
            Err(ConfigError::TooSmall { .. })
        ));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        let capped = policy.delay_for(10);
        assert!(capped >= Duration::from_millis(300) && capped <= Duration::from_millis(450));
        assert_eq!(RetryPolicy::immediate(3).delay_for(2), Duration::ZERO);
    }
}
