//! Change detection between consecutive risk calculations.
//!
//! Alerts are additive: every rule that fires contributes one alert, and no
//! deduplication happens here. Each threshold fires only when strictly
//! exceeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::engine::RiskCalculation;
use crate::types::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Composite score increase, in points.
    pub score_change: f64,
    /// Absolute discount-rate change.
    pub rate_change: f64,
    /// Composite confidence decrease.
    pub confidence_drop: f64,
    /// Any single component above this score raises a warning.
    pub component_high: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds { score_change: 15.0, rate_change: 0.005, confidence_drop: 0.20, component_high: 80.0 }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.score_change, self.rate_change, self.confidence_drop, self.component_high];
        if all.iter().all(|t| t.is_finite() && *t > 0.0) {
            Ok(())
        } else {
            Err(ConfigError::InvalidAlertThresholds(format!("{self:?}: thresholds must be positive")))
        }
    }
}

/// Compare `current` against `previous` and apply the absolute checks.
pub fn detect_alerts(
    current: &RiskCalculation,
    previous: Option<&RiskCalculation>,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut push = |level: AlertLevel, message: String, action: &str| {
        alerts.push(Alert { level, message, action: action.to_string(), timestamp: now });
    };

    let cur = &current.composite;

    if let Some(prev) = previous {
        let delta = cur.score - prev.composite.score;
        if delta > thresholds.score_change {
            let level = if cur.level >= RiskLevel::High { AlertLevel::Critical } else { AlertLevel::Warning };
            push(
                level,
                format!(
                    "Risk score rose {delta:.0} points ({:.0} → {:.0}), now {}",
                    prev.composite.score, cur.score, cur.level
                ),
                "Review receivable exposure and pricing",
            );
        }

        let drop = prev.composite.confidence - cur.confidence;
        if drop > thresholds.confidence_drop {
            push(
                AlertLevel::Warning,
                format!(
                    "Assessment confidence fell from {:.0}% to {:.0}%",
                    prev.composite.confidence * 100.0,
                    cur.confidence * 100.0
                ),
                "Verify external data sources",
            );
        }
    }

    let change = current.discount_rate.change;
    if change.abs() > thresholds.rate_change {
        let level = if change > 0.0 && change.abs() > 2.0 * thresholds.rate_change {
            AlertLevel::Warning
        } else {
            AlertLevel::Info
        };
        let direction = if change > 0.0 { "rose" } else { "fell" };
        push(
            level,
            format!(
                "Discount rate {direction} {:.2} percentage points to {:.2}%",
                change.abs() * 100.0,
                current.discount_rate.calculated * 100.0
            ),
            "Reprice receivable at the updated discount rate",
        );
    }

    if cur.level == RiskLevel::Critical {
        push(
            AlertLevel::Critical,
            format!("Risk level CRITICAL (score {:.0})", cur.score),
            "Escalate for immediate mitigation",
        );
    }

    for (name, component) in [
        ("production", &current.production),
        ("credit", &current.credit),
        ("policy", &current.policy),
    ] {
        let score = component.value().score;
        if score > thresholds.component_high {
            push(
                AlertLevel::Warning,
                format!("High {name} risk (score {score:.0})"),
                match name {
                    "production" => "Review weather exposure and production insurance",
                    "credit" => "Review counterparty exposure and collateral",
                    _ => "Monitor regulatory developments",
                },
            );
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::components::{Assessed, RiskComponentResult};
    use crate::scoring::{CompositeRiskResult, DiscountRateResult};
    use crate::types::EntityId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn component(score: f64) -> Assessed<RiskComponentResult> {
        Assessed::Confident(RiskComponentResult { score, factors: vec![], confidence: 0.9, last_update: now() })
    }

    fn calc(score: f64, level: RiskLevel, confidence: f64, rate_change: f64) -> RiskCalculation {
        RiskCalculation {
            entity_id: EntityId(1),
            calculated_at: now(),
            production: component(20.0),
            credit: component(20.0),
            policy: component(20.0),
            composite: CompositeRiskResult { score, level, confidence },
            discount_rate: DiscountRateResult {
                calculated: 0.04,
                previous: Some(0.04 - rate_change),
                change: rate_change,
                reason: String::new(),
            },
            recommendations: vec![],
            alerts: vec![],
            next_review_date: now(),
        }
    }

    fn detect(cur: &RiskCalculation, prev: Option<&RiskCalculation>) -> Vec<Alert> {
        detect_alerts(cur, prev, &AlertThresholds::default(), now())
    }

    #[test]
    fn score_delta_equal_to_threshold_does_not_fire() {
        let prev = calc(40.0, RiskLevel::Medium, 0.8, 0.0);
        let cur = calc(55.0, RiskLevel::Medium, 0.8, 0.0);
        assert!(detect(&cur, Some(&prev)).is_empty());
    }

    #[test]
    fn confidence_drop_equal_to_threshold_does_not_fire() {
        // 0.5 - 0.3 is exactly 0.2 in f64.
        assert_eq!(0.5 - 0.3, AlertThresholds::default().confidence_drop);
        let prev = calc(40.0, RiskLevel::Medium, 0.5, 0.0);
        let cur = calc(40.0, RiskLevel::Medium, 0.3, 0.0);
        assert!(detect(&cur, Some(&prev)).is_empty());
    }

    #[test]
    fn confidence_drop_just_above_threshold_fires() {
        let prev = calc(40.0, RiskLevel::Medium, 0.5, 0.0);
        let cur = calc(40.0, RiskLevel::Medium, 0.2999, 0.0);
        let alerts = detect(&cur, Some(&prev));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert!(alerts[0].message.contains("confidence"));
    }

    #[test]
    fn score_delta_above_threshold_fires_warning() {
        let prev = calc(40.0, RiskLevel::Medium, 0.8, 0.0);
        let cur = calc(55.01, RiskLevel::Medium, 0.8, 0.0);
        let alerts = detect(&cur, Some(&prev));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
    }

    #[test]
    fn score_jump_into_high_is_critical() {
        let prev = calc(50.0, RiskLevel::Medium, 0.8, 0.0);
        let cur = calc(72.0, RiskLevel::High, 0.8, 0.0);
        let alerts = detect(&cur, Some(&prev));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn no_history_means_no_delta_alerts() {
        let cur = calc(85.0, RiskLevel::High, 0.3, 0.0);
        assert!(detect(&cur, None).is_empty());
    }

    #[test]
    fn rate_change_direction_and_magnitude() {
        let small_up = detect(&calc(40.0, RiskLevel::Medium, 0.8, 0.007), None);
        assert_eq!(small_up.len(), 1);
        assert_eq!(small_up[0].level, AlertLevel::Info);

        let large_up = detect(&calc(40.0, RiskLevel::Medium, 0.8, 0.02), None);
        assert_eq!(large_up[0].level, AlertLevel::Warning);

        let large_down = detect(&calc(40.0, RiskLevel::Medium, 0.8, -0.02), None);
        assert_eq!(large_down[0].level, AlertLevel::Info);
        assert!(large_down[0].message.contains("fell"));

        assert!(detect(&calc(40.0, RiskLevel::Medium, 0.8, 0.005), None).is_empty());
    }

    #[test]
    fn confidence_drop_fires_warning() {
        let prev = calc(40.0, RiskLevel::Medium, 0.85, 0.0);
        let cur = calc(40.0, RiskLevel::Medium, 0.60, 0.0);
        let alerts = detect(&cur, Some(&prev));
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("confidence"));
    }

    #[test]
    fn critical_level_always_alerts() {
        let cur = calc(93.0, RiskLevel::Critical, 0.8, 0.0);
        let alerts = detect(&cur, None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn alerts_are_additive() {
        let prev = calc(50.0, RiskLevel::Medium, 0.9, 0.0);
        let mut cur = calc(92.0, RiskLevel::Critical, 0.5, 0.03);
        cur.credit = component(95.0);
        cur.policy = component(81.0);
        let alerts = detect(&cur, Some(&prev));
        // score delta, confidence drop, rate change, critical level, two components
        assert_eq!(alerts.len(), 6);
        assert_eq!(alerts.iter().filter(|a| a.level == AlertLevel::Critical).count(), 2);
    }

    #[test]
    fn component_exactly_at_bound_does_not_fire() {
        let mut cur = calc(40.0, RiskLevel::Medium, 0.8, 0.0);
        cur.production = component(80.0);
        assert!(detect(&cur, None).is_empty());
    }
}
