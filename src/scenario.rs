//! Deterministic baseline forecasts and named scenario adjustments.
//!
//! A baseline is built from expected weather and price paths (no sampling).
//! Scenarios never touch the baseline: [`apply_scenario`] returns a new
//! forecast whose months and aggregates are recomputed from scratch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monte_carlo::ClimateCashFlowModel;

/// Half-width of the baseline band, as a fraction of each month's total.
pub const BASELINE_BAND: f64 = 0.10;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("unknown scenario template '{0}' (expected base, optimistic, pessimistic or stress)")]
    UnknownTemplate(String),

    #[error("invalid scenario template: {0}")]
    InvalidTemplate(String),

    #[error("baseline forecast has no months")]
    EmptyBaseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyForecast {
    /// 1-based month of the horizon.
    pub month: u32,
    pub production: f64,
    pub receivables_risk_adjusted: f64,
    pub incentives_risk_adjusted: f64,
    pub total: f64,
    pub lower: f64,
    pub upper: f64,
}

impl MonthlyForecast {
    fn new(month: u32, production: f64, receivables: f64, incentives: f64, band: f64) -> Self {
        let total = production + receivables + incentives;
        let half_width = total.abs() * band;
        MonthlyForecast {
            month,
            production,
            receivables_risk_adjusted: receivables,
            incentives_risk_adjusted: incentives,
            total,
            lower: total - half_width,
            upper: total + half_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub months: Vec<MonthlyForecast>,
    /// Band half-width fraction used for every month.
    pub band: f64,
    pub total: f64,
    pub average: f64,
    /// Standard deviation of the monthly totals.
    pub volatility: f64,
}

impl Forecast {
    fn from_months(months: Vec<MonthlyForecast>, band: f64) -> Self {
        let n = months.len().max(1) as f64;
        let total: f64 = months.iter().map(|m| m.total).sum();
        let average = total / n;
        let variance = months.iter().map(|m| (m.total - average).powi(2)).sum::<f64>() / n;
        Forecast { months, band, total, average, volatility: variance.sqrt() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioForecast {
    pub name: String,
    pub template: ScenarioTemplate,
    pub forecast: Forecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    pub production_multiplier: f64,
    /// Receivable amounts are divided by this.
    pub credit_risk_multiplier: f64,
    /// Incentive amounts are divided by this.
    pub policy_risk_multiplier: f64,
    pub variance_multiplier: f64,
}

impl ScenarioTemplate {
    pub const NAMES: [&'static str; 4] = ["base", "optimistic", "pessimistic", "stress"];

    pub fn identity() -> Self {
        ScenarioTemplate {
            production_multiplier: 1.0,
            credit_risk_multiplier: 1.0,
            policy_risk_multiplier: 1.0,
            variance_multiplier: 1.0,
        }
    }

    pub fn named(name: &str) -> Result<Self, ScenarioError> {
        let (production, credit, policy, variance) = match name.to_ascii_lowercase().as_str() {
            "base" => return Ok(Self::identity()),
            "optimistic" => (1.15, 0.8, 0.8, 0.8),
            "pessimistic" => (0.85, 1.25, 1.3, 1.3),
            "stress" => (0.65, 1.6, 1.8, 1.8),
            _ => return Err(ScenarioError::UnknownTemplate(name.to_string())),
        };
        Ok(ScenarioTemplate {
            production_multiplier: production,
            credit_risk_multiplier: credit,
            policy_risk_multiplier: policy,
            variance_multiplier: variance,
        })
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        let all = [
            self.production_multiplier,
            self.credit_risk_multiplier,
            self.policy_risk_multiplier,
            self.variance_multiplier,
        ];
        if all.iter().all(|m| m.is_finite() && *m > 0.0) {
            Ok(())
        } else {
            Err(ScenarioError::InvalidTemplate(format!("{self:?}: multipliers must be positive")))
        }
    }
}

/// Monthly forecast from expected weather and mean price paths.
pub fn baseline_forecast(model: &ClimateCashFlowModel) -> Forecast {
    let months = model
        .expected_months()
        .into_iter()
        .map(|m| MonthlyForecast::new(m.month, m.production, m.receivables, m.incentives, BASELINE_BAND))
        .collect();
    Forecast::from_months(months, BASELINE_BAND)
}

pub fn apply_scenario(baseline: &Forecast, name: &str) -> Result<ScenarioForecast, ScenarioError> {
    apply_template(baseline, name, ScenarioTemplate::named(name)?)
}

pub fn apply_template(
    baseline: &Forecast,
    name: &str,
    template: ScenarioTemplate,
) -> Result<ScenarioForecast, ScenarioError> {
    template.validate()?;
    if baseline.months.is_empty() {
        return Err(ScenarioError::EmptyBaseline);
    }
    let band = baseline.band * template.variance_multiplier;
    let months = baseline
        .months
        .iter()
        .map(|m| {
            MonthlyForecast::new(
                m.month,
                m.production * template.production_multiplier,
                m.receivables_risk_adjusted / template.credit_risk_multiplier,
                m.incentives_risk_adjusted / template.policy_risk_multiplier,
                band,
            )
        })
        .collect();
    Ok(ScenarioForecast { name: name.to_string(), template, forecast: Forecast::from_months(months, band) })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn baseline() -> Forecast {
        let months = (1..=12)
            .map(|m| {
                let seasonal = 1.0 + 0.3 * (m as f64 / 12.0 * std::f64::consts::TAU).sin();
                MonthlyForecast::new(m, 100_000.0 * seasonal, 20_000.0, if m == 6 { 15_000.0 } else { 0.0 }, BASELINE_BAND)
            })
            .collect();
        Forecast::from_months(months, BASELINE_BAND)
    }

    #[test]
    fn identity_reproduces_baseline_exactly() {
        let base = baseline();
        let s = apply_scenario(&base, "base").unwrap();
        assert_eq!(s.forecast, base);
    }

    #[test]
    fn baseline_is_not_mutated() {
        let base = baseline();
        let copy = base.clone();
        apply_scenario(&base, "stress").unwrap();
        assert_eq!(base, copy);
    }

    #[test]
    fn stress_lowers_totals_and_widens_bands() {
        let base = baseline();
        let stress = apply_scenario(&base, "stress").unwrap().forecast;
        assert!(stress.total < base.total);
        let m = &stress.months[5];
        assert_relative_eq!(m.production, base.months[5].production * 0.65, max_relative = 1e-12);
        assert_relative_eq!(m.receivables_risk_adjusted, 20_000.0 / 1.6, max_relative = 1e-12);
        assert_relative_eq!(m.incentives_risk_adjusted, 15_000.0 / 1.8, max_relative = 1e-12);
        assert_relative_eq!((m.upper - m.total) / m.total, 0.18, max_relative = 1e-12);
    }

    #[test]
    fn optimistic_raises_totals() {
        let base = baseline();
        let opt = apply_scenario(&base, "Optimistic").unwrap().forecast;
        assert!(opt.total > base.total);
        assert_relative_eq!(opt.average, opt.total / 12.0, max_relative = 1e-12);
    }

    #[test]
    fn aggregates_recomputed_from_months() {
        let f = apply_scenario(&baseline(), "pessimistic").unwrap().forecast;
        let total: f64 = f.months.iter().map(|m| m.total).sum();
        assert_relative_eq!(f.total, total, max_relative = 1e-12);
        assert!(f.volatility > 0.0);
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert_eq!(
            apply_scenario(&baseline(), "apocalypse").unwrap_err(),
            ScenarioError::UnknownTemplate("apocalypse".into())
        );
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        let t = ScenarioTemplate { credit_risk_multiplier: 0.0, ..ScenarioTemplate::identity() };
        assert!(matches!(apply_template(&baseline(), "custom", t), Err(ScenarioError::InvalidTemplate(_))));
    }

    #[test]
    fn empty_baseline_is_rejected() {
        let empty = Forecast::from_months(vec![], BASELINE_BAND);
        assert_eq!(apply_scenario(&empty, "base").unwrap_err(), ScenarioError::EmptyBaseline);
    }

    #[test]
    fn every_named_template_resolves() {
        for name in ScenarioTemplate::NAMES {
            ScenarioTemplate::named(name).unwrap().validate().unwrap();
        }
    }
}
