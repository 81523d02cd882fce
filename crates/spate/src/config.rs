//! Process-level configuration (spec §6 "Process interface", §A.3).
//! Grounded on `odgrim-abathur-swarm`'s `clap::Parser` derive `Cli`, with
//! the label defaults from `cmd/default_flags.go`; parsed from CLI flags
//! (with `clap`'s `env` feature as fallback), not from a config file — the
//! Go original uses `cobra`/`pflag` for exactly this and nothing is
//! persisted to disk.

use clap::Args;
use humantime::Duration as HumanDuration;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Address the metrics endpoint listens on.
    #[arg(long, env = "SPATE_LISTEN_ADDRESS", default_value = ":8080")]
    pub listen_address: String,

    /// Docker socket to connect to. Empty uses bollard's default connection.
    #[arg(long, env = "DOCKER_SOCKET", default_value = "")]
    pub docker_socket: String,

    /// How often the change producer reconciles against the orchestrator.
    #[arg(long, env = "SPATE_CONTROLLER_PERIOD", default_value = "5s")]
    pub controller_period: HumanDuration,

    #[arg(long, env = "SPATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Default autoscaler period, overridable per-service via labels.
    #[arg(long, env = "SPATE_DEFAULT_AUTOSCALER_PERIOD", default_value = "30s")]
    pub default_autoscaler_period: HumanDuration,

    #[arg(
        long,
        env = "SPATE_DEFAULT_COOLDOWN_SERVICE_ADDED",
        default_value = "0s"
    )]
    pub default_cooldown_service_added: HumanDuration,

    #[arg(
        long,
        env = "SPATE_DEFAULT_COOLDOWN_SERVICE_UPDATED",
        default_value = "0s"
    )]
    pub default_cooldown_service_updated: HumanDuration,

    #[arg(long, env = "SPATE_DEFAULT_COOLDOWN_SCALED_UP", default_value = "180s")]
    pub default_cooldown_scaled_up: HumanDuration,

    #[arg(
        long,
        env = "SPATE_DEFAULT_COOLDOWN_SCALED_DOWN",
        default_value = "300s"
    )]
    pub default_cooldown_scaled_down: HumanDuration,

    #[arg(long, env = "SPATE_DEFAULT_OBSERVER_PERIOD", default_value = "30s")]
    pub default_observer_period: HumanDuration,

    #[arg(long, env = "SPATE_DEFAULT_AGGREGATION_AMOUNT", default_value_t = 5)]
    pub default_aggregation_amount: u8,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_address.is_empty() {
            return Err("listen_address must not be empty".to_string());
        }
        if self.controller_period.as_secs() == 0 {
            return Err("controller_period must be > 0".to_string());
        }
        if self.default_aggregation_amount == 0 {
            return Err("default_aggregation_amount must be > 0".to_string());
        }
        Ok(())
    }

    pub fn controller_period(&self) -> Duration {
        *self.controller_period
    }

    /// Build the label decoder's default set, with this config's overrides
    /// layered on top (mirrors `cmd/default_flags.go`'s
    /// `readAndSetDefaults`).
    pub fn label_defaults(&self) -> crate::label::Defaults {
        crate::label::Defaults {
            autoscaler: crate::label::AutoscalerDefaults {
                period: *self.default_autoscaler_period,
                cooldown_scaled_up: *self.default_cooldown_scaled_up,
                cooldown_scaled_down: *self.default_cooldown_scaled_down,
                cooldown_service_added: *self.default_cooldown_service_added,
                cooldown_service_updated: *self.default_cooldown_service_updated,
                ..Default::default()
            },
            metric: crate::label::MetricDefaults {
                aggregation_amount: self.default_aggregation_amount,
                observer_period: *self.default_observer_period,
                ..Default::default()
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: ":8080".to_string(),
            docker_socket: String::new(),
            controller_period: "5s".parse().unwrap(),
            log_level: "info".to_string(),
            default_autoscaler_period: "30s".parse().unwrap(),
            default_cooldown_service_added: "0s".parse().unwrap(),
            default_cooldown_service_updated: "0s".parse().unwrap(),
            default_cooldown_scaled_up: "180s".parse().unwrap(),
            default_cooldown_scaled_down: "300s".parse().unwrap(),
            default_observer_period: "30s".parse().unwrap(),
            default_aggregation_amount: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.controller_period(), Duration::from_secs(5));
    }

    #[test]
    fn validate_rejects_empty_listen_address() {
        let config = Config {
            listen_address: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_controller_period() {
        let config = Config {
            controller_period: "0s".parse().unwrap(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn label_defaults_carries_overrides() {
        let config = Config {
            default_aggregation_amount: 7,
            ..Config::default()
        };
        let defaults = config.label_defaults();
        assert_eq!(defaults.metric.aggregation_amount, 7);
    }
}
