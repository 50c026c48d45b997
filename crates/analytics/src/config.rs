//! Engine configuration.
//!
//! Everything the engine tunes is passed in explicitly; there are no globals.
//! A config is validated before any computation starts, and a broken config
//! fails the whole call with `InvalidConfiguration`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{EngineError, EngineResult};

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Upper bound for every day-count setting (one hundred years).
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// `days` as a duration, rejecting values chrono cannot represent.
pub fn window_length(days: i64) -> EngineResult<TimeDelta> {
    TimeDelta::try_days(days)
        .ok_or_else(|| EngineError::invalid_configuration(format!("window of {days} days is out of range")))
}

/// Start of a window of `days` ending at `as_of`.
pub fn window_start(as_of: DateTime<Utc>, days: i64) -> EngineResult<DateTime<Utc>> {
    as_of
        .checked_sub_signed(window_length(days)?)
        .ok_or_else(|| {
            EngineError::invalid_configuration(format!("window of {days} days starts before the representable range"))
        })
}

/// Days-to-stockout limits of the alert rule table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyThresholds {
    /// Projected stockout within this many days is critical.
    pub critical_days: f64,
    /// At/below minimum and stockout within this many days is high.
    pub high_days: f64,
    /// Stockout within this many days is low (and triggers a reorder).
    pub low_days: f64,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            critical_days: 3.0,
            high_days: 7.0,
            low_days: 14.0,
        }
    }
}

impl UrgencyThresholds {
    pub fn new(critical_days: f64, high_days: f64, low_days: f64) -> Self {
        Self {
            critical_days,
            high_days,
            low_days,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("critical_days", self.critical_days),
            ("high_days", self.high_days),
            ("low_days", self.low_days),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid_configuration(format!(
                    "urgency.{name} must be a finite non-negative number (got {value})"
                )));
            }
        }
        if self.critical_days > self.high_days || self.high_days > self.low_days {
            return Err(EngineError::invalid_configuration(
                "urgency thresholds must satisfy critical_days <= high_days <= low_days",
            ));
        }
        Ok(())
    }
}

/// Weights of the four health sub-scores. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub availability: f64,
    pub adequacy: f64,
    pub turnover: f64,
    pub activity: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            availability: 0.25,
            adequacy: 0.25,
            turnover: 0.30,
            activity: 0.20,
        }
    }
}

impl HealthWeights {
    pub fn new(availability: f64, adequacy: f64, turnover: f64, activity: f64) -> Self {
        Self {
            availability,
            adequacy,
            turnover,
            activity,
        }
    }

    pub fn sum(&self) -> f64 {
        self.availability + self.adequacy + self.turnover + self.activity
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("availability", self.availability),
            ("adequacy", self.adequacy),
            ("turnover", self.turnover),
            ("activity", self.activity),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid_configuration(format!(
                    "health weight {name} must be a finite non-negative number (got {value})"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(EngineError::invalid_configuration(format!(
                "health weights must sum to 1 (got {sum})"
            )));
        }
        Ok(())
    }
}

/// Full configuration surface of the analytics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Consumption lookback window.
    pub lookback_days: i64,
    pub urgency: UrgencyThresholds,
    /// Idle period after which stock counts as slow-moving.
    pub slow_mover_idle_days: i64,
    /// Horizon a reorder should cover.
    pub reorder_coverage_days: i64,
    pub health_weights: HealthWeights,
    /// Multiplier mapping annual stock turns onto the 0-100 turnover sub-score.
    pub turnover_scale: f64,
    /// Window for the activity sub-score.
    pub activity_window_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            urgency: UrgencyThresholds::default(),
            slow_mover_idle_days: 180,
            reorder_coverage_days: 60,
            health_weights: HealthWeights::default(),
            turnover_scale: 25.0,
            activity_window_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_urgency(mut self, urgency: UrgencyThresholds) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_slow_mover_idle_days(mut self, days: i64) -> Self {
        self.slow_mover_idle_days = days;
        self
    }

    pub fn with_reorder_coverage_days(mut self, days: i64) -> Self {
        self.reorder_coverage_days = days;
        self
    }

    pub fn with_health_weights(mut self, weights: HealthWeights) -> Self {
        self.health_weights = weights;
        self
    }

    pub fn with_turnover_scale(mut self, scale: f64) -> Self {
        self.turnover_scale = scale;
        self
    }

    pub fn with_activity_window_days(mut self, days: i64) -> Self {
        self.activity_window_days = days;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("lookback_days", self.lookback_days),
            ("reorder_coverage_days", self.reorder_coverage_days),
            ("activity_window_days", self.activity_window_days),
        ] {
            if value <= 0 {
                return Err(EngineError::invalid_configuration(format!(
                    "{name} must be positive (got {value})"
                )));
            }
        }
        if self.slow_mover_idle_days < 0 {
            return Err(EngineError::invalid_configuration(format!(
                "slow_mover_idle_days cannot be negative (got {})",
                self.slow_mover_idle_days
            )));
        }
        for (name, value) in [
            ("lookback_days", self.lookback_days),
            ("reorder_coverage_days", self.reorder_coverage_days),
            ("activity_window_days", self.activity_window_days),
            ("slow_mover_idle_days", self.slow_mover_idle_days),
        ] {
            if value > MAX_WINDOW_DAYS {
                return Err(EngineError::invalid_configuration(format!(
                    "{name} cannot exceed {MAX_WINDOW_DAYS} (got {value})"
                )));
            }
        }
        if !(self.turnover_scale.is_finite() && self.turnover_scale > 0.0) {
            return Err(EngineError::invalid_configuration(format!(
                "turnover_scale must be a finite positive number (got {})",
                self.turnover_scale
            )));
        }
        self.urgency.validate()?;
        self.health_weights.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lookback_days, 30);
        assert_eq!(config.urgency, UrgencyThresholds::new(3.0, 7.0, 14.0));
        assert_eq!(config.slow_mover_idle_days, 180);
        assert_eq!(config.reorder_coverage_days, 60);
        assert_eq!(config.health_weights, HealthWeights::new(0.25, 0.25, 0.30, 0.20));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let config = EngineConfig::default().with_health_weights(HealthWeights::new(0.5, 0.5, 0.5, 0.0));
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn negative_weights_are_rejected_even_when_sum_is_one() {
        let weights = HealthWeights::new(-0.25, 0.75, 0.30, 0.20);
        assert!(weights.validate().is_err());
    }

    #[test]
    fn negative_or_misordered_thresholds_are_rejected() {
        assert!(UrgencyThresholds::new(-1.0, 7.0, 14.0).validate().is_err());
        assert!(UrgencyThresholds::new(3.0, 20.0, 14.0).validate().is_err());
        assert!(UrgencyThresholds::new(0.0, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn windows_must_be_positive() {
        assert!(EngineConfig::default().with_lookback_days(0).validate().is_err());
        assert!(EngineConfig::default().with_reorder_coverage_days(-60).validate().is_err());
        assert!(EngineConfig::default().with_slow_mover_idle_days(-1).validate().is_err());
        assert!(EngineConfig::default().with_turnover_scale(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let huge = 200_000_000;
        for config in [
            EngineConfig::default().with_lookback_days(huge),
            EngineConfig::default().with_activity_window_days(huge),
            EngineConfig::default().with_slow_mover_idle_days(huge),
            EngineConfig::default().with_reorder_coverage_days(huge),
        ] {
            assert!(matches!(config.validate(), Err(EngineError::InvalidConfiguration(_))));
        }
        assert!(EngineConfig::default().with_lookback_days(MAX_WINDOW_DAYS).validate().is_ok());
    }

    #[test]
    fn window_start_reports_overflow() {
        let as_of = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(window_start(as_of, 1).unwrap(), as_of - TimeDelta::days(1));
        assert!(matches!(window_start(as_of, 200_000_000), Err(EngineError::InvalidConfiguration(_))));
        assert!(matches!(window_start(as_of, i64::MAX), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "lookback_days": 14, "urgency": { "low_days": 21 } }"#).unwrap();
        assert_eq!(config.lookback_days, 14);
        assert_eq!(config.urgency.low_days, 21.0);
        assert_eq!(config.urgency.critical_days, 3.0);
        assert_eq!(config.reorder_coverage_days, 60);
    }
}
