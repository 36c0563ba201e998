//! Harness configuration resolved from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HarnessError, Result};

/// Environment variable naming the scenarios root.
pub const ENV_SCENARIOS_DIR: &str = "HARNESS_SCENARIOS_DIR";
/// Environment variable naming the recordings root.
pub const ENV_RECORDINGS_DIR: &str = "HARNESS_RECORDINGS_DIR";
/// Environment variable enabling the HTTP-archive export by default.
pub const ENV_EXPORT_HAR: &str = "HARNESS_EXPORT_HAR";
/// Environment variable setting the stale-session watchdog, in seconds.
pub const ENV_SESSION_TIMEOUT: &str = "HARNESS_SESSION_TIMEOUT_SECS";
/// Environment variable naming the system-under-test base URL.
pub const ENV_TARGET_URL: &str = "HARNESS_TARGET_URL";

const DEFAULT_SCENARIOS_DIR: &str = "tests/scenarios";
const DEFAULT_RECORDINGS_DIR: &str = "tests/recordings";

/// Resolved harness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Root directory for native scenario documents.
    pub scenarios_root: PathBuf,
    /// Root directory for archive exports and regression reports.
    pub recordings_root: PathBuf,
    /// Whether `stop_recording` also writes an HTTP-archive export.
    pub export_har: bool,
    /// Age after which an open session is force-stopped by the next `start_*`.
    pub session_timeout: Option<Duration>,
    /// Base URL of the live system under test.
    pub target_url: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scenarios_root: PathBuf::from(DEFAULT_SCENARIOS_DIR),
            recordings_root: PathBuf::from(DEFAULT_RECORDINGS_DIR),
            export_har: false,
            session_timeout: None,
            target_url: None,
        }
    }
}

impl HarnessConfig {
    /// Builds a config rooted at `root/scenarios` and `root/recordings`.
    #[must_use]
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            scenarios_root: root.join("scenarios"),
            recordings_root: root.join("recordings"),
            ..Self::default()
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let export_har = match lookup(ENV_EXPORT_HAR) {
            Some(value) => parse_flag(ENV_EXPORT_HAR, &value)?,
            None => defaults.export_har,
        };
        let session_timeout = lookup(ENV_SESSION_TIMEOUT)
            .map(|value| {
                value.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    HarnessError::Config(format!("Invalid {ENV_SESSION_TIMEOUT} value: {value}"))
                })
            })
            .transpose()?;

        Ok(Self {
            scenarios_root: lookup(ENV_SCENARIOS_DIR)
                .map_or(defaults.scenarios_root, PathBuf::from),
            recordings_root: lookup(ENV_RECORDINGS_DIR)
                .map_or(defaults.recordings_root, PathBuf::from),
            export_har,
            session_timeout,
            target_url: lookup(ENV_TARGET_URL).filter(|url| !url.trim().is_empty()),
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(HarnessError::Config(format!("Invalid {name} value: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = HarnessConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.scenarios_root, PathBuf::from("tests/scenarios"));
    }

    #[test]
    fn reads_all_variables() {
        let config = HarnessConfig::from_lookup(lookup_from(&[
            (ENV_SCENARIOS_DIR, "/data/scenarios"),
            (ENV_RECORDINGS_DIR, "/data/recordings"),
            (ENV_EXPORT_HAR, "Yes"),
            (ENV_SESSION_TIMEOUT, "30"),
            (ENV_TARGET_URL, "http://localhost:8080"),
        ]))
        .unwrap();

        assert_eq!(config.scenarios_root, PathBuf::from("/data/scenarios"));
        assert_eq!(config.recordings_root, PathBuf::from("/data/recordings"));
        assert!(config.export_har);
        assert_eq!(config.session_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.target_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn rejects_invalid_flag() {
        let err = HarnessConfig::from_lookup(lookup_from(&[(ENV_EXPORT_HAR, "maybe")]));
        assert!(matches!(err, Err(HarnessError::Config(msg)) if msg.contains("maybe")));
    }

    #[test]
    fn rejects_invalid_timeout() {
        let err = HarnessConfig::from_lookup(lookup_from(&[(ENV_SESSION_TIMEOUT, "soon")]));
        assert!(err.is_err());
    }

    #[test]
    fn rooted_at_splits_roots() {
        let config = HarnessConfig::rooted_at("/tmp/h");
        assert_eq!(config.scenarios_root, PathBuf::from("/tmp/h/scenarios"));
        assert_eq!(config.recordings_root, PathBuf::from("/tmp/h/recordings"));
    }
}
