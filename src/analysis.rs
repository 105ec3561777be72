//! Distribution statistics over a batch of simulated outcomes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Sample variance (n − 1 denominator).
    pub variance: f64,
    pub skewness: f64,
    /// Excess kurtosis; 0 for a normal distribution.
    pub kurtosis: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioValues {
    pub optimistic: f64,
    pub realistic: f64,
    pub pessimistic: f64,
    pub worst_case: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Sorted outcome at the (1 − confidence) tail index.
    pub var_95: f64,
    /// Mean of all outcomes at or below the VaR index.
    pub cvar: f64,
    pub probability_of_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub statistics: Statistics,
    pub percentiles: Percentiles,
    pub scenarios: ScenarioValues,
    pub risk_metrics: RiskMetrics,
}

/// Linearly interpolated percentile of an ascending-sorted, non-empty slice.
/// The result always lies between the two bracketing values, so percentiles
/// stay ordered under rounding.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let h = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    (sorted[lo] + (sorted[hi] - sorted[lo]) * frac).min(sorted[hi])
}

/// Sort `values` in place and summarise them. `None` for an empty batch.
pub fn summarise(values: &mut [f64], confidence: f64) -> Option<DistributionSummary> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    let nf = n as f64;

    let mean = values.iter().sum::<f64>() / nf;
    let (m2, m3, m4) = values.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), x| {
        let d = x - mean;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    });
    let variance = if n > 1 { m2 / (nf - 1.0) } else { 0.0 };
    let (pop2, pop3, pop4) = (m2 / nf, m3 / nf, m4 / nf);
    let (skewness, kurtosis) = if pop2 > 0.0 {
        (pop3 / pop2.powf(1.5), pop4 / (pop2 * pop2) - 3.0)
    } else {
        (0.0, 0.0)
    };

    let percentiles = Percentiles {
        p5: percentile(values, 0.05),
        p10: percentile(values, 0.10),
        p25: percentile(values, 0.25),
        p50: percentile(values, 0.50),
        p75: percentile(values, 0.75),
        p90: percentile(values, 0.90),
        p95: percentile(values, 0.95),
    };

    let tail_index = (((1.0 - confidence) * nf).floor() as usize).min(n - 1);
    let tail = &values[..=tail_index];
    let risk_metrics = RiskMetrics {
        var_95: values[tail_index],
        cvar: tail.iter().sum::<f64>() / tail.len() as f64,
        probability_of_loss: values.iter().filter(|v| **v < 0.0).count() as f64 / nf,
    };

    let scenarios = ScenarioValues {
        optimistic: percentiles.p90,
        realistic: percentiles.p50,
        pessimistic: percentiles.p10,
        worst_case: percentiles.p5,
    };

    Some(DistributionSummary {
        statistics: Statistics {
            mean,
            median: percentiles.p50,
            std_dev: variance.sqrt(),
            variance,
            skewness,
            kurtosis,
        },
        percentiles,
        scenarios,
        risk_metrics,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_values() {
        let mut values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let s = summarise(&mut values, 0.95).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0], "sorted in place");
        assert!((s.statistics.mean - 3.0).abs() < 1e-12);
        assert!((s.statistics.median - 3.0).abs() < 1e-12);
        assert!((s.statistics.variance - 2.5).abs() < 1e-12);
        assert!(s.statistics.skewness.abs() < 1e-12);
        // Uniform-ish: population kurtosis 1.7 → excess −1.3.
        assert!((s.statistics.kurtosis + 1.3).abs() < 1e-12);
        // h = 0.25 × 4 = 1 → exactly the second value.
        assert!((s.percentiles.p25 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_batch_returns_none() {
        let mut values: Vec<f64> = vec![];
        assert!(summarise(&mut values, 0.95).is_none());
    }

    #[test]
    fn single_value_has_zero_spread() {
        let mut values = vec![42.0];
        let s = summarise(&mut values, 0.95).unwrap();
        assert_eq!(s.statistics.variance, 0.0);
        assert_eq!(s.risk_metrics.var_95, 42.0);
        assert_eq!(s.risk_metrics.cvar, 42.0);
    }

    #[test]
    fn tail_metrics_on_ranked_values() {
        // −49..=50: 100 values, 49 negative.
        let mut values: Vec<f64> = (-49..=50).map(|i| i as f64).collect();
        let s = summarise(&mut values, 0.95).unwrap();
        // Tail index floor(0.05 × 100) = 5 → sixth smallest value.
        assert_eq!(s.risk_metrics.var_95, -44.0);
        // Mean of −49..=−44.
        assert!((s.risk_metrics.cvar + 46.5).abs() < 1e-12);
        assert!((s.risk_metrics.probability_of_loss - 0.49).abs() < 1e-12);
    }

    #[test]
    fn scenarios_map_to_percentiles() {
        let mut values: Vec<f64> = (0..1_000).map(|i| i as f64).collect();
        let s = summarise(&mut values, 0.95).unwrap();
        assert_eq!(s.scenarios.optimistic, s.percentiles.p90);
        assert_eq!(s.scenarios.realistic, s.percentiles.p50);
        assert_eq!(s.scenarios.pessimistic, s.percentiles.p10);
        assert_eq!(s.scenarios.worst_case, s.percentiles.p5);
    }

    #[test]
    fn right_skewed_sample_has_positive_skewness() {
        let mut values: Vec<f64> = (1..=200).map(|i| (i as f64 / 40.0).exp()).collect();
        let s = summarise(&mut values, 0.95).unwrap();
        assert!(s.statistics.skewness > 0.5, "skewness {}", s.statistics.skewness);
    }

    proptest! {
        #[test]
        fn percentiles_are_ordered(mut values in prop::collection::vec(-1e6f64..1e6, 1..300)) {
            let s = summarise(&mut values, 0.95).unwrap();
            let p = &s.percentiles;
            prop_assert!(p.p5 <= p.p10 && p.p10 <= p.p25 && p.p25 <= p.p50);
            prop_assert!(p.p50 <= p.p75 && p.p75 <= p.p90 && p.p90 <= p.p95);
            let var = s.risk_metrics.var_95;
            prop_assert!(s.risk_metrics.cvar <= var + 1e-6 * (1.0 + var.abs()));
        }
    }
}
