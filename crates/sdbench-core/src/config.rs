//! Benchmark configuration: defaults, TOML file, environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, SdbenchError};

/// Timeout and retry settings applied to every external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallPolicy {
    /// Maximum wall-clock time for a single attempt (milliseconds).
    pub timeout_ms: u64,
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
    /// Hard limit on one call including every attempt and backoff (milliseconds).
    pub ceiling_ms: u64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 2,
            backoff_base_ms: 500,
            ceiling_ms: 120_000,
        }
    }
}

impl CallPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }

    /// Delay before retry number `attempt` (1-based attempt that just failed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Everything an encounter and a benchmark run need to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub max_turns_per_case: u32,
    pub physician_visit_cost: f64,
    pub correct_diagnosis_threshold: u8,
    /// Charge a physician visit for the turn that delivers the diagnosis.
    pub charge_visit_on_diagnose: bool,
    /// Refuse over-broad questions and unspecific test orders.
    pub reject_vague_requests: bool,
    pub max_concurrent_encounters: usize,
    pub calls: CallPolicy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            max_turns_per_case: 10,
            physician_visit_cost: 300.0,
            correct_diagnosis_threshold: 4,
            charge_visit_on_diagnose: true,
            reject_vague_requests: true,
            max_concurrent_encounters: 4,
            calls: CallPolicy::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| SdbenchError::InvalidConfig(format!("{key}={raw:?} is not a valid value")))
}

impl BenchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply `SDBENCH_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SDBENCH_MAX_TURNS") {
            self.max_turns_per_case = parse_env("SDBENCH_MAX_TURNS", &v)?;
        }
        if let Some(v) = lookup("SDBENCH_VISIT_COST") {
            self.physician_visit_cost = parse_env("SDBENCH_VISIT_COST", &v)?;
        }
        if let Some(v) = lookup("SDBENCH_THRESHOLD") {
            self.correct_diagnosis_threshold = parse_env("SDBENCH_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("SDBENCH_CALL_TIMEOUT_MS") {
            self.calls.timeout_ms = parse_env("SDBENCH_CALL_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("SDBENCH_MAX_RETRIES") {
            self.calls.max_retries = parse_env("SDBENCH_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("SDBENCH_CONCURRENCY") {
            self.max_concurrent_encounters = parse_env("SDBENCH_CONCURRENCY", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_turns_per_case == 0 {
            return Err(SdbenchError::InvalidConfig(
                "max_turns_per_case must be at least 1".to_string(),
            ));
        }
        if !self.physician_visit_cost.is_finite() || self.physician_visit_cost < 0.0 {
            return Err(SdbenchError::InvalidConfig(format!(
                "physician_visit_cost must be a non-negative number, got {}",
                self.physician_visit_cost
            )));
        }
        if !(1..=5).contains(&self.correct_diagnosis_threshold) {
            return Err(SdbenchError::InvalidConfig(format!(
                "correct_diagnosis_threshold must be in 1..=5, got {}",
                self.correct_diagnosis_threshold
            )));
        }
        if self.max_concurrent_encounters == 0 {
            return Err(SdbenchError::InvalidConfig(
                "max_concurrent_encounters must be at least 1".to_string(),
            ));
        }
        if self.calls.timeout_ms == 0 {
            return Err(SdbenchError::InvalidConfig(
                "calls.timeout_ms must be positive".to_string(),
            ));
        }
        if self.calls.ceiling_ms < self.calls.timeout_ms {
            return Err(SdbenchError::InvalidConfig(format!(
                "calls.ceiling_ms ({}) must not be below calls.timeout_ms ({})",
                self.calls.ceiling_ms, self.calls.timeout_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.max_turns_per_case, 10);
        assert_eq!(cfg.physician_visit_cost, 300.0);
        assert_eq!(cfg.correct_diagnosis_threshold, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = CallPolicy {
            backoff_base_ms: 10,
            ..Default::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = BenchConfig::from_toml_str(
            r#"
            max_turns_per_case = 3
            physician_visit_cost = 250.0

            [calls]
            timeout_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_turns_per_case, 3);
        assert_eq!(cfg.physician_visit_cost, 250.0);
        assert_eq!(cfg.correct_diagnosis_threshold, 4);
        assert_eq!(cfg.calls.timeout_ms, 1000);
        assert_eq!(cfg.calls.max_retries, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            BenchConfig::from_toml_str("max_turns_per_case = 0"),
            Err(SdbenchError::InvalidConfig(_))
        ));
        assert!(matches!(
            BenchConfig::from_toml_str("correct_diagnosis_threshold = 6"),
            Err(SdbenchError::InvalidConfig(_))
        ));
        assert!(matches!(
            BenchConfig::from_toml_str("max_turns_per_case = \"ten\""),
            Err(SdbenchError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("SDBENCH_MAX_TURNS", "5"), ("SDBENCH_THRESHOLD", "3")]
            .into_iter()
            .collect();
        let cfg = BenchConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.max_turns_per_case, 5);
        assert_eq!(cfg.correct_diagnosis_threshold, 3);

        let bad = BenchConfig::default()
            .with_overrides(|k| (k == "SDBENCH_VISIT_COST").then(|| "cheap".to_string()));
        assert!(matches!(bad, Err(SdbenchError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdbench.toml");
        std::fs::write(&path, "max_concurrent_encounters = 1\n").unwrap();
        let cfg = BenchConfig::load(&path).unwrap();
        assert_eq!(cfg.max_concurrent_encounters, 1);
    }
}
