use std::env;
use std::fmt;

use crate::analysis::{FailedChildPolicy, WeightCombination};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for an engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub failed_child_policy: FailedChildPolicy,
    pub weight_combination: WeightCombination,
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let failed_child_policy = match env::var("ENGINE_FAILED_CHILD_POLICY") {
            Ok(value) => parse_failed_child_policy(&value)?,
            Err(_) => FailedChildPolicy::Exclude,
        };

        let weight_combination = match env::var("ENGINE_WEIGHT_COMBINATION") {
            Ok(value) => parse_weight_combination(&value)?,
            Err(_) => WeightCombination::Product,
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            failed_child_policy,
            weight_combination,
        })
    }
}

fn parse_failed_child_policy(value: &str) -> Result<FailedChildPolicy, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "exclude" => Ok(FailedChildPolicy::Exclude),
        "worst" => Ok(FailedChildPolicy::Worst),
        "propagate" => Ok(FailedChildPolicy::Propagate),
        _ => Err(ConfigError::InvalidFailedChildPolicy {
            value: value.to_string(),
        }),
    }
}

fn parse_weight_combination(value: &str) -> Result<WeightCombination, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "product" => Ok(WeightCombination::Product),
        "sum" => Ok(WeightCombination::Sum),
        _ => Err(ConfigError::InvalidWeightCombination {
            value: value.to_string(),
        }),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidFailedChildPolicy { value: String },
    InvalidWeightCombination { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidFailedChildPolicy { value } => write!(
                f,
                "ENGINE_FAILED_CHILD_POLICY must be one of exclude, worst, propagate (got '{}')",
                value
            ),
            ConfigError::InvalidWeightCombination { value } => write!(
                f,
                "ENGINE_WEIGHT_COMBINATION must be one of product, sum (got '{}')",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("ENGINE_FAILED_CHILD_POLICY");
        env::remove_var("ENGINE_WEIGHT_COMBINATION");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = EngineConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.failed_child_policy, FailedChildPolicy::Exclude);
        assert_eq!(config.weight_combination, WeightCombination::Product);
    }

    #[test]
    fn load_reads_policy_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("ENGINE_FAILED_CHILD_POLICY", "worst");
        env::set_var("ENGINE_WEIGHT_COMBINATION", "sum");
        let config = EngineConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.failed_child_policy, FailedChildPolicy::Worst);
        assert_eq!(config.weight_combination, WeightCombination::Sum);
        reset_env();
    }

    #[test]
    fn load_rejects_unknown_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ENGINE_FAILED_CHILD_POLICY", "ignore");
        let result = EngineConfig::load();
        match result {
            Err(ConfigError::InvalidFailedChildPolicy { value }) => assert_eq!(value, "ignore"),
            other => panic!("expected invalid policy error, got {other:?}"),
        }
        reset_env();
    }
}
