//! Composite risk scoring and the risk-driven discount rate.

use serde::{Deserialize, Serialize};

use crate::components::RiskComponentResult;
use crate::config::ConfigError;
use crate::types::RiskLevel;

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Component weights; must be non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub production: f64,
    pub credit: f64,
    pub policy: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights { production: 0.4, credit: 0.4, policy: 0.2 }
    }
}

impl RiskWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ws = [self.production, self.credit, self.policy];
        if ws.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidWeights(format!("{self:?} contains a negative weight")));
        }
        let sum: f64 = ws.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::InvalidWeights(format!("weights sum to {sum}, expected 1")));
        }
        Ok(())
    }

    fn combine(&self, production: f64, credit: f64, policy: f64) -> f64 {
        production * self.production + credit * self.credit + policy * self.policy
    }
}

/// Lower bounds of MEDIUM, HIGH and CRITICAL. A score equal to a breakpoint
/// belongs to the higher level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        LevelThresholds { medium: 30.0, high: 70.0, critical: 90.0 }
    }
}

impl LevelThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = 0.0 < self.medium && self.medium < self.high && self.high < self.critical
            && self.critical <= 100.0;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::InvalidThresholds(format!(
                "breakpoints {}/{}/{} must be strictly increasing within (0, 100]",
                self.medium, self.high, self.critical
            )))
        }
    }

    pub fn level(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRiskResult {
    /// Rounded to an integer value, 0–100.
    pub score: f64,
    pub level: RiskLevel,
    pub confidence: f64,
}

/// Weighted combination of the three component results.
pub fn composite(
    production: &RiskComponentResult,
    credit: &RiskComponentResult,
    policy: &RiskComponentResult,
    weights: &RiskWeights,
    thresholds: &LevelThresholds,
) -> CompositeRiskResult {
    let raw = weights.combine(production.score, credit.score, policy.score);
    let score = raw.round().clamp(0.0, 100.0);
    let confidence = weights
        .combine(production.confidence, credit.confidence, policy.confidence)
        .clamp(0.0, 1.0);
    CompositeRiskResult { score, level: thresholds.level(score), confidence }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountRateConfig {
    pub base_low: f64,
    pub base_medium: f64,
    pub base_high: f64,
    pub base_critical: f64,
    /// Added per unit of score/100.
    pub score_factor: f64,
    /// Added per unit of (1 − confidence).
    pub uncertainty_factor: f64,
    /// Compared against when no previous rate exists.
    pub default_previous: f64,
    /// Changes larger than this are spelled out in the reason.
    pub reportable_change: f64,
}

impl Default for DiscountRateConfig {
    fn default() -> Self {
        DiscountRateConfig {
            base_low: 0.02,
            base_medium: 0.035,
            base_high: 0.05,
            base_critical: 0.075,
            score_factor: 0.015,
            uncertainty_factor: 0.01,
            default_previous: 0.035,
            reportable_change: 0.005,
        }
    }
}

impl DiscountRateConfig {
    pub fn base(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Low => self.base_low,
            RiskLevel::Medium => self.base_medium,
            RiskLevel::High => self.base_high,
            RiskLevel::Critical => self.base_critical,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bases = RiskLevel::ALL.map(|l| self.base(l));
        let increasing = bases[0] >= 0.0 && bases.windows(2).all(|w| w[0] < w[1]);
        if !increasing {
            return Err(ConfigError::InvalidDiscountRates(format!(
                "base rates {bases:?} must be non-negative and strictly increasing with level"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRateResult {
    pub calculated: f64,
    pub previous: Option<f64>,
    /// Against `previous`, or against the configured default when there is none.
    pub change: f64,
    pub reason: String,
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// `base(level) + score/100 × score_factor + (1 − confidence) × uncertainty_factor
/// + market_adjustment`, floored at zero and rounded to 4 decimal places.
pub fn discount_rate(
    composite: &CompositeRiskResult,
    previous: Option<f64>,
    market_adjustment: f64,
    config: &DiscountRateConfig,
) -> DiscountRateResult {
    let rate = config.base(composite.level)
        + composite.score / 100.0 * config.score_factor
        + (1.0 - composite.confidence) * config.uncertainty_factor
        + market_adjustment;
    let calculated = round4(rate.max(0.0));
    let change = round4(calculated - previous.unwrap_or(config.default_previous));

    let mut reason = format!("{} risk level (score {:.0})", composite.level, composite.score);
    if change.abs() > config.reportable_change {
        let direction = if change > 0.0 { "increased" } else { "decreased" };
        reason.push_str(&format!(
            "; rate {direction} by {:.2} percentage points",
            change.abs() * 100.0
        ));
    }

    DiscountRateResult { calculated, previous, change, reason }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;

    fn component(score: f64, confidence: f64) -> RiskComponentResult {
        RiskComponentResult { score, factors: vec![], confidence, last_update: Utc::now() }
    }

    fn result(score: f64, level: RiskLevel, confidence: f64) -> CompositeRiskResult {
        CompositeRiskResult { score, level, confidence }
    }

    #[test]
    fn default_weights_are_valid() {
        RiskWeights::default().validate().unwrap();
        LevelThresholds::default().validate().unwrap();
        DiscountRateConfig::default().validate().unwrap();
    }

    #[test]
    fn weights_not_summing_to_one_are_rejected() {
        let w = RiskWeights { production: 0.5, credit: 0.4, policy: 0.2 };
        assert!(matches!(w.validate(), Err(ConfigError::InvalidWeights(_))));
        let w = RiskWeights { production: 1.2, credit: -0.2, policy: 0.0 };
        assert!(w.validate().is_err());
    }

    #[test]
    fn level_breakpoints_partition_scores() {
        let t = LevelThresholds::default();
        assert_eq!(t.level(0.0), RiskLevel::Low);
        assert_eq!(t.level(29.0), RiskLevel::Low);
        assert_eq!(t.level(30.0), RiskLevel::Medium);
        assert_eq!(t.level(69.0), RiskLevel::Medium);
        assert_eq!(t.level(70.0), RiskLevel::High);
        assert_eq!(t.level(89.0), RiskLevel::High);
        assert_eq!(t.level(90.0), RiskLevel::Critical);
        assert_eq!(t.level(100.0), RiskLevel::Critical);
    }

    #[test]
    fn unordered_thresholds_are_rejected() {
        let t = LevelThresholds { medium: 50.0, high: 40.0, critical: 90.0 };
        assert!(t.validate().is_err());
    }

    #[test]
    fn composite_applies_weights_and_rounds() {
        let c = composite(
            &component(50.0, 0.9),
            &component(81.0, 0.6),
            &component(30.0, 0.5),
            &RiskWeights::default(),
            &LevelThresholds::default(),
        );
        // 20 + 32.4 + 6 = 58.4
        assert_eq!(c.score, 58.0);
        assert_eq!(c.level, RiskLevel::Medium);
        // 0.36 + 0.24 + 0.1
        assert!((c.confidence - 0.70).abs() < 1e-12);
    }

    #[test]
    fn discount_rate_high_level_example() {
        let d = discount_rate(&result(72.0, RiskLevel::High, 0.8), None, 0.0, &DiscountRateConfig::default());
        assert!((d.calculated - 0.0628).abs() < 1e-12, "calculated {}", d.calculated);
        assert_eq!(d.previous, None);
        assert!((d.change - 0.0278).abs() < 1e-12);
        assert!(d.reason.contains("HIGH"));
        assert!(d.reason.contains("increased"), "reason: {}", d.reason);
    }

    #[test]
    fn small_change_is_not_spelled_out() {
        let d = discount_rate(
            &result(72.0, RiskLevel::High, 0.8),
            Some(0.0600),
            0.0,
            &DiscountRateConfig::default(),
        );
        assert!((d.change - 0.0028).abs() < 1e-12);
        assert!(!d.reason.contains("increased"));
    }

    #[test]
    fn rate_never_negative() {
        let d = discount_rate(&result(0.0, RiskLevel::Low, 1.0), None, -0.5, &DiscountRateConfig::default());
        assert_eq!(d.calculated, 0.0);
        assert!(d.reason.contains("decreased"));
    }

    #[test]
    fn non_increasing_base_rates_are_rejected() {
        let cfg = DiscountRateConfig { base_high: 0.03, ..DiscountRateConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDiscountRates(_))));
    }

    fn weights() -> impl Strategy<Value = RiskWeights> {
        (0.0f64..1.0, 0.0f64..1.0).prop_map(|(a, b)| {
            let production = a;
            let credit = (1.0 - a) * b;
            RiskWeights { production, credit, policy: 1.0 - production - credit }
        })
    }

    proptest! {
        #[test]
        fn composite_is_bounded_and_monotone(
            w in weights(),
            p in 0.0f64..=100.0,
            c in 0.0f64..=100.0,
            q in 0.0f64..=100.0,
            bump in 0.0f64..=50.0,
        ) {
            let t = LevelThresholds::default();
            let base = composite(&component(p, 0.5), &component(c, 0.5), &component(q, 0.5), &w, &t);
            prop_assert!((0.0..=100.0).contains(&base.score));
            for which in 0..3 {
                let mut s = [p, c, q];
                s[which] = (s[which] + bump).min(100.0);
                let bumped = composite(&component(s[0], 0.5), &component(s[1], 0.5), &component(s[2], 0.5), &w, &t);
                prop_assert!(bumped.score >= base.score);
                prop_assert!(bumped.level >= base.level);
            }
        }

        #[test]
        fn level_is_monotone_in_score(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let t = LevelThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(t.level(lo) <= t.level(hi));
        }

        #[test]
        fn discount_rate_increases_with_level(score in 0.0f64..=100.0, conf in 0.0f64..=1.0) {
            let cfg = DiscountRateConfig::default();
            let rates: Vec<f64> = RiskLevel::ALL
                .iter()
                .map(|l| discount_rate(&result(score, *l, conf), None, 0.0, &cfg).calculated)
                .collect();
            prop_assert!(rates.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
