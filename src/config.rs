//! Mind-wide settings.
//!
//! Settings come from [`MindConfig::default`], a JSON document, or
//! `MECA_*` environment variables. Per-codelet overrides (cadence, motor
//! arbitration) are set on the declarations themselves.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codelets::ArbitrationPolicy;
use crate::error::MindError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindConfig {
    /// Period of codelets that don't set their own cadence.
    pub default_cadence_ms: u64,
    /// Worker threads of the codelet runtime; `None` uses one per core.
    pub worker_threads: Option<usize>,
    /// Records kept in the action history broadcast.
    pub history_capacity: usize,
    /// Arbitration used by motors without their own policy.
    pub arbitration: ArbitrationPolicy,
    /// How long `shut_down` waits for codelet loops to exit.
    pub shutdown_grace_ms: u64,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            default_cadence_ms: 100,
            worker_threads: None,
            history_capacity: 32,
            arbitration: ArbitrationPolicy::default(),
            shutdown_grace_ms: 1000,
        }
    }
}

impl MindConfig {
    /// Parse a (possibly partial) JSON document; missing keys keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, MindError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MindError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by any `MECA_*` variable that is set.
    pub fn from_env() -> Result<Self, MindError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MindError> {
        let mut config = Self::default();
        if let Some(value) = lookup("MECA_DEFAULT_CADENCE_MS") {
            config.default_cadence_ms = parse_var("MECA_DEFAULT_CADENCE_MS", &value)?;
        }
        if let Some(value) = lookup("MECA_WORKER_THREADS") {
            config.worker_threads = Some(parse_var("MECA_WORKER_THREADS", &value)?);
        }
        if let Some(value) = lookup("MECA_HISTORY_CAPACITY") {
            config.history_capacity = parse_var("MECA_HISTORY_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("MECA_ARBITRATION") {
            config.arbitration = value.parse().map_err(MindError::Config)?;
        }
        if let Some(value) = lookup("MECA_SHUTDOWN_GRACE_MS") {
            config.shutdown_grace_ms = parse_var("MECA_SHUTDOWN_GRACE_MS", &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MindError> {
        if self.default_cadence_ms == 0 {
            return Err(MindError::Config("default_cadence_ms must be positive".into()));
        }
        if self.worker_threads == Some(0) {
            return Err(MindError::Config("worker_threads must be positive".into()));
        }
        if self.history_capacity == 0 {
            return Err(MindError::Config("history_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn default_cadence(&self) -> Duration {
        Duration::from_millis(self.default_cadence_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, MindError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| MindError::Config(format!("{key}={value}: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = MindConfig::default();
        assert_eq!(config.default_cadence(), Duration::from_millis(100));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(1));
        assert_eq!(config.history_capacity, 32);
        assert_eq!(config.arbitration, ArbitrationPolicy::HighestActivation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config =
            MindConfig::from_json(r#"{"default_cadence_ms": 20, "arbitration": "most_recent"}"#)
                .unwrap();
        assert_eq!(config.default_cadence_ms, 20);
        assert_eq!(config.arbitration, ArbitrationPolicy::MostRecent);
        assert_eq!(config.history_capacity, 32);

        assert!(MindConfig::from_json(r#"{"history_capacity": 0}"#).is_err());
        assert!(MindConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MECA_DEFAULT_CADENCE_MS", "15"),
            ("MECA_WORKER_THREADS", "2"),
            ("MECA_ARBITRATION", "role-precedence"),
        ]);
        let config = MindConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.default_cadence_ms, 15);
        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.arbitration, ArbitrationPolicy::RolePrecedence);
        assert_eq!(config.shutdown_grace_ms, 1000);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err = MindConfig::from_lookup(|key| {
            (key == "MECA_HISTORY_CAPACITY").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("MECA_HISTORY_CAPACITY"));

        assert!(MindConfig::from_lookup(|key| {
            (key == "MECA_WORKER_THREADS").then(|| "0".to_string())
        })
        .is_err());
    }
}
