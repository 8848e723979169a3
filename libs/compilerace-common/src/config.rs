// Runtime configuration, read from the environment with defaults

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_JUDGE0_URL: &str = "https://ce.judge0.com";

#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub initial_delay_ms: u64,
    pub step_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 150,
            step_ms: 100,
            max_delay_ms: 800,
            max_attempts: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub judge0_url: String,
    pub store_path: PathBuf,
    pub questions_path: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub poll: PollSettings,
    /// Catalog entries must mention this to count as the target runtime.
    pub runtime_keyword: String,
    /// Preferred distribution among matching runtimes.
    pub preferred_distribution: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judge0_url: DEFAULT_JUDGE0_URL.to_string(),
            store_path: default_store_path(),
            questions_path: None,
            http_timeout_secs: 20,
            poll: PollSettings::default(),
            runtime_keyword: "java".to_string(),
            preferred_distribution: "openjdk".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let poll = PollSettings {
            initial_delay_ms: parse_or(&lookup, "COMPILERACE_POLL_INITIAL_MS", defaults.poll.initial_delay_ms),
            step_ms: parse_or(&lookup, "COMPILERACE_POLL_STEP_MS", defaults.poll.step_ms),
            max_delay_ms: parse_or(&lookup, "COMPILERACE_POLL_MAX_MS", defaults.poll.max_delay_ms),
            max_attempts: parse_or(&lookup, "COMPILERACE_POLL_ATTEMPTS", defaults.poll.max_attempts),
        };

        Self {
            judge0_url: lookup("COMPILERACE_JUDGE0_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.judge0_url),
            store_path: lookup("COMPILERACE_STORE")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            questions_path: lookup("COMPILERACE_QUESTIONS").map(PathBuf::from),
            http_timeout_secs: parse_or(&lookup, "COMPILERACE_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            poll,
            runtime_keyword: lookup("COMPILERACE_RUNTIME").unwrap_or(defaults.runtime_keyword),
            preferred_distribution: lookup("COMPILERACE_DISTRIBUTION")
                .unwrap_or(defaults.preferred_distribution),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, default = %default, "Ignoring unparsable setting");
                default
            }
        },
        None => default,
    }
}

fn default_store_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".compilerace").join("store.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.judge0_url, DEFAULT_JUDGE0_URL);
        assert_eq!(config.poll, PollSettings::default());
        assert_eq!(config.runtime_keyword, "java");
        assert!(config.questions_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("COMPILERACE_JUDGE0_URL", "http://localhost:2358/"),
            ("COMPILERACE_POLL_ATTEMPTS", "5"),
            ("COMPILERACE_STORE", "/tmp/race.json"),
        ]));
        assert_eq!(config.judge0_url, "http://localhost:2358");
        assert_eq!(config.poll.max_attempts, 5);
        assert_eq!(config.store_path, PathBuf::from("/tmp/race.json"));
    }

    #[test]
    fn test_bad_number_falls_back() {
        let config = Config::from_lookup(lookup_from(&[("COMPILERACE_POLL_MAX_MS", "soon")]));
        assert_eq!(config.poll.max_delay_ms, 800);
    }
}
