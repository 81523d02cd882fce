//! Autoscaler-level label parsing (period, cooldowns, replica bounds).
//! Grounded on `label/autoscaler.go`'s `ParseAutoscaler` and its five
//! `Default*` package vars.

use super::error::DecodeError;
use std::collections::HashMap;
use std::time::Duration;

pub struct AutoscalerDefaults {
    pub period: Duration,
    pub cooldown_scaled_up: Duration,
    pub cooldown_scaled_down: Duration,
    pub cooldown_service_added: Duration,
    pub cooldown_service_updated: Duration,
    pub replicas_min: u64,
    pub replicas_max: u64,
}

impl Default for AutoscalerDefaults {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            cooldown_scaled_up: Duration::from_secs(180),
            // spec.md's authoritative default; the upstream Go CLI flag
            // registration for this one reads "5s", which looks like a typo
            // against its own documented 5-minute default.
            cooldown_scaled_down: Duration::from_secs(300),
            cooldown_service_added: Duration::from_secs(0),
            cooldown_service_updated: Duration::from_secs(0),
            replicas_min: 1,
            replicas_max: u64::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cooldowns {
    pub service_added: Duration,
    pub service_updated: Duration,
    pub scaled_up: Duration,
    pub scaled_down: Duration,
}

pub struct AutoscalerLabels {
    pub period: Duration,
    pub cooldowns: Cooldowns,
    pub replicas_min: u64,
    pub replicas_max: u64,
}

/// `labels` are the full namespace-stripped label map (i.e. `autoscaler.period`,
/// not `de.mtneug.spate.autoscaler.period`).
pub fn parse_autoscaler(
    labels: &HashMap<String, String>,
    defaults: &AutoscalerDefaults,
) -> Result<AutoscalerLabels, DecodeError> {
    let period = parse_duration_or(labels, "autoscaler.period", defaults.period)?;
    let scaled_up =
        parse_duration_or(labels, "autoscaler.cooldown.scaled_up", defaults.cooldown_scaled_up)?;
    let scaled_down = parse_duration_or(
        labels,
        "autoscaler.cooldown.scaled_down",
        defaults.cooldown_scaled_down,
    )?;
    let service_added = parse_duration_or(
        labels,
        "autoscaler.cooldown.service_added",
        defaults.cooldown_service_added,
    )?;
    let service_updated = parse_duration_or(
        labels,
        "autoscaler.cooldown.service_updated",
        defaults.cooldown_service_updated,
    )?;

    let replicas_min = parse_uint_or(labels, "replicas.min", defaults.replicas_min)?;
    let replicas_max = parse_uint_or(labels, "replicas.max", defaults.replicas_max)?;

    Ok(AutoscalerLabels {
        period,
        cooldowns: Cooldowns {
            service_added,
            service_updated,
            scaled_up,
            scaled_down,
        },
        replicas_min,
        replicas_max,
    })
}

fn parse_duration_or(
    labels: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Result<Duration, DecodeError> {
    match labels.get(key) {
        None => Ok(default),
        Some(s) => humantime::parse_duration(s)
            .map_err(|_| DecodeError::InvalidDuration(key.to_string(), s.clone())),
    }
}

fn parse_uint_or(
    labels: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, DecodeError> {
    match labels.get(key) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| DecodeError::InvalidUnsignedInteger(key.to_string(), s.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_labels_absent() {
        let parsed = parse_autoscaler(&HashMap::new(), &AutoscalerDefaults::default()).unwrap();
        assert_eq!(parsed.period, Duration::from_secs(30));
        assert_eq!(parsed.cooldowns.scaled_down, Duration::from_secs(300));
        assert_eq!(parsed.replicas_min, 1);
        assert_eq!(parsed.replicas_max, u64::MAX);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut labels = HashMap::new();
        labels.insert("autoscaler.period".to_string(), "10s".to_string());
        labels.insert("replicas.min".to_string(), "2".to_string());
        labels.insert("replicas.max".to_string(), "8".to_string());
        let parsed = parse_autoscaler(&labels, &AutoscalerDefaults::default()).unwrap();
        assert_eq!(parsed.period, Duration::from_secs(10));
        assert_eq!(parsed.replicas_min, 2);
        assert_eq!(parsed.replicas_max, 8);
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let mut labels = HashMap::new();
        labels.insert("autoscaler.period".to_string(), "not-a-duration".to_string());
        let err = parse_autoscaler(&labels, &AutoscalerDefaults::default()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDuration(_, _)));
    }
}
