//! Monte Carlo cash-flow simulation.
//!
//! [`run`] drives any [`IterationModel`] through `iterations` independent
//! paths in parallel and summarises the resulting NPVs. Iteration `i` draws
//! from its own ChaCha20 stream (`seed`, stream `i`), so no iteration sees
//! another's state and a seeded run reproduces exactly regardless of how
//! rayon schedules work. An iteration that fails is retried on a fresh
//! stream; it is never dropped, since dropped paths bias the distribution.
//!
//! [`ClimateCashFlowModel`] is the production model: per iteration it samples
//! financial variables once, then weather for every month of the horizon, and
//! sums discounted production, receivable and incentive flows.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::{self, Percentiles, RiskMetrics, ScenarioValues, Statistics};
use crate::providers::{Asset, Incentive, Receivable};
use crate::sampling::SamplingError;
use crate::types::{AssetId, AssetType, HOURS_IN_MONTH, calendar_month_index};
use crate::variables::{
    FinancialSample, FinancialSampler, MarketModel, SeasonalClimate, WeatherSample, WeatherSampler,
};

/// Longest supported horizon (50 years).
pub const MAX_HORIZON_MONTHS: u32 = 600;

/// Composite score assumed for receivables that were never scored.
const UNSCORED_RISK: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub iterations: usize,
    pub confidence: f64,
    pub horizon_months: u32,
    /// Fixed seed for a reproducible run; drawn at random when `None`.
    pub seed: Option<u64>,
    /// Extra attempts per failing iteration before the run fails.
    pub max_retries: u32,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig { iterations: 10_000, confidence: 0.95, horizon_months: 12, seed: None, max_retries: 3 }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.iterations == 0 {
            return Err(SimulationError::InvalidConfig("iterations must be at least 1".to_string()));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "confidence {} must lie strictly between 0 and 1",
                self.confidence
            )));
        }
        if self.horizon_months == 0 || self.horizon_months > MAX_HORIZON_MONTHS {
            return Err(SimulationError::InvalidConfig(format!(
                "horizon of {} months outside 1..={MAX_HORIZON_MONTHS}",
                self.horizon_months
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid simulation configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid model input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error("iteration {iteration} failed after {attempts} attempts: {source}")]
    IterationFailed { iteration: usize, attempts: u32, source: IterationError },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IterationError {
    #[error("non-finite outcome {0}")]
    NonFinite(f64),

    #[error("{0}")]
    Model(String),
}

/// One simulation path producing a single scalar outcome.
pub trait IterationModel: Sync {
    fn simulate(&self, rng: &mut ChaCha20Rng) -> Result<f64, IterationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub simulations: usize,
    pub confidence: f64,
    pub horizon_months: u32,
    pub seed: u64,
    /// Iterations that needed at least one retry.
    pub retried_iterations: usize,
    pub statistics: Statistics,
    pub percentiles: Percentiles,
    pub scenarios: ScenarioValues,
    pub risk_metrics: RiskMetrics,
}

fn iteration_rng(seed: u64, iteration: usize, attempt: u32) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed.wrapping_add((attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)));
    rng.set_stream(iteration as u64);
    rng
}

fn run_iteration<M: IterationModel>(
    model: &M,
    seed: u64,
    iteration: usize,
    max_retries: u32,
) -> Result<(f64, bool), SimulationError> {
    let mut attempt = 0;
    loop {
        let mut rng = iteration_rng(seed, iteration, attempt);
        let outcome = model.simulate(&mut rng).and_then(|v| {
            if v.is_finite() { Ok(v) } else { Err(IterationError::NonFinite(v)) }
        });
        match outcome {
            Ok(v) => return Ok((v, attempt > 0)),
            Err(e) if attempt < max_retries => {
                warn!(iteration, attempt, error = %e, "iteration failed; retrying");
                attempt += 1;
            }
            Err(e) => {
                return Err(SimulationError::IterationFailed { iteration, attempts: attempt + 1, source: e });
            }
        }
    }
}

/// Run `config.iterations` independent paths of `model` and summarise them.
pub fn run<M: IterationModel>(model: &M, config: &MonteCarloConfig) -> Result<MonteCarloResult, SimulationError> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(rand::random);
    debug!(iterations = config.iterations, seed, "starting Monte Carlo run");

    let outcomes: Vec<(f64, bool)> = (0..config.iterations)
        .into_par_iter()
        .map(|i| run_iteration(model, seed, i, config.max_retries))
        .collect::<Result<_, _>>()?;

    let retried_iterations = outcomes.iter().filter(|(_, retried)| *retried).count();
    let mut values: Vec<f64> = outcomes.into_iter().map(|(v, _)| v).collect();
    let summary = analysis::summarise(&mut values, config.confidence)
        .ok_or_else(|| SimulationError::InvalidConfig("no iterations ran".to_string()))?;

    debug!(
        mean = summary.statistics.mean,
        p5 = summary.percentiles.p5,
        p95 = summary.percentiles.p95,
        retried_iterations,
        "Monte Carlo run complete"
    );

    Ok(MonteCarloResult {
        simulations: values.len(),
        confidence: config.confidence,
        horizon_months: config.horizon_months,
        seed,
        retried_iterations,
        statistics: summary.statistics,
        percentiles: summary.percentiles,
        scenarios: summary.scenarios,
        risk_metrics: summary.risk_metrics,
    })
}

// ── Climate cash-flow model ─────────────────────────────────────────────────

/// Optional learned production model. Returning `None` (or a non-finite
/// value) falls back to the physical capacity-factor model.
pub trait ProductionPredictor: Send + Sync {
    fn capacity_factor(&self, asset: &Asset, calendar_month: usize, weather: &WeatherSample) -> Option<f64>;
}

/// Everything the climate model needs, gathered by the caller.
#[derive(Debug, Clone)]
pub struct CashFlowInputs {
    pub assets: Vec<Asset>,
    pub receivables: Vec<Receivable>,
    pub incentives: Vec<Incentive>,
    /// Month 1 of the horizon is the month containing this date.
    pub valuation_date: NaiveDate,
    pub climate: SeasonalClimate,
    pub market: MarketModel,
    /// Fraction of a receivable lost at a composite score of 100.
    pub credit_loss_severity: f64,
}

/// Expected (not sampled) flows for one forecast month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedMonth {
    pub month: u32,
    pub production: f64,
    pub receivables: f64,
    pub incentives: f64,
}

/// Photovoltaic reference irradiance, kWh/m²/day.
const REFERENCE_IRRADIANCE: f64 = 5.0;
/// Module output loss per °C above 25 °C.
const TEMPERATURE_DERATING: f64 = 0.004;
const WIND_CUT_IN: f64 = 3.0;
const WIND_RATED: f64 = 12.0;
const WIND_CUT_OUT: f64 = 25.0;
const WIND_AVAILABILITY: f64 = 0.95;

/// Physical capacity factor of `asset` under `weather`, in [0, 1].
pub fn effective_capacity_factor(asset: &Asset, weather: &WeatherSample) -> f64 {
    let cf = match asset.asset_type {
        AssetType::Solar => {
            let derate = 1.0 - TEMPERATURE_DERATING * (weather.temperature - 25.0).max(0.0);
            asset.base_capacity_factor * (weather.irradiance / REFERENCE_IRRADIANCE) * derate
        }
        AssetType::Wind => {
            let v = weather.wind_speed;
            let curve = if !(WIND_CUT_IN..WIND_CUT_OUT).contains(&v) {
                0.0
            } else if v >= WIND_RATED {
                1.0
            } else {
                ((v - WIND_CUT_IN) / (WIND_RATED - WIND_CUT_IN)).powi(3)
            };
            curve * WIND_AVAILABILITY
        }
        AssetType::Hydro => {
            asset.base_capacity_factor * (0.7 + 0.05 * weather.precipitation_days as f64)
        }
        AssetType::Other => asset.base_capacity_factor,
    };
    cf.clamp(0.0, 1.0)
}

/// 1-based month of `date` within a horizon starting in `valuation`'s month.
/// Dates before the valuation month map to month 1.
fn horizon_month(valuation: NaiveDate, date: NaiveDate) -> u32 {
    let months = (date.year() - valuation.year()) * 12 + date.month() as i32 - valuation.month() as i32;
    (months + 1).max(1) as u32
}

pub struct ClimateCashFlowModel {
    assets: Vec<Asset>,
    weather: WeatherSampler,
    financial: FinancialSampler,
    horizon_months: u32,
    start_month: u32,
    /// Risk-adjusted receivable flow per month; index 0 is month 1.
    receivable_flows: Vec<f64>,
    /// Risk-adjusted incentive flow per month; index 0 is month 1.
    incentive_flows: Vec<f64>,
    predictors: HashMap<AssetId, Arc<dyn ProductionPredictor>>,
}

impl std::fmt::Debug for ClimateCashFlowModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClimateCashFlowModel")
            .field("assets", &self.assets.len())
            .field("horizon_months", &self.horizon_months)
            .field("predictors", &self.predictors.len())
            .finish()
    }
}

impl ClimateCashFlowModel {
    pub fn new(inputs: &CashFlowInputs, horizon_months: u32) -> Result<Self, SimulationError> {
        if horizon_months == 0 || horizon_months > MAX_HORIZON_MONTHS {
            return Err(SimulationError::InvalidConfig(format!("horizon of {horizon_months} months")));
        }
        if !(0.0..=1.0).contains(&inputs.credit_loss_severity) {
            return Err(SimulationError::InvalidInput(format!(
                "credit loss severity {} outside [0, 1]",
                inputs.credit_loss_severity
            )));
        }
        for a in &inputs.assets {
            let fields = [a.capacity_mw, a.base_capacity_factor, a.monthly_operating_cost, a.carbon_offset_per_mwh];
            if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(SimulationError::InvalidInput(format!("{} has a negative or non-finite parameter", a.id)));
            }
        }

        let h = horizon_months as usize;
        let mut receivable_flows = vec![0.0; h];
        for r in &inputs.receivables {
            let month = horizon_month(inputs.valuation_date, r.due_date) as usize;
            if month > h || !r.amount.is_finite() {
                continue;
            }
            let score = r.risk_score.unwrap_or(UNSCORED_RISK).clamp(0.0, 100.0);
            let recovery = 1.0 - score / 100.0 * inputs.credit_loss_severity;
            receivable_flows[month - 1] += r.amount * recovery;
        }
        let mut incentive_flows = vec![0.0; h];
        for inc in &inputs.incentives {
            let month = horizon_month(inputs.valuation_date, inc.expected_date) as usize;
            if month > h || !inc.amount.is_finite() {
                continue;
            }
            incentive_flows[month - 1] += inc.amount * (1.0 - inc.policy_risk.clamp(0.0, 1.0));
        }

        Ok(ClimateCashFlowModel {
            assets: inputs.assets.clone(),
            weather: WeatherSampler::new(&inputs.climate)?,
            financial: FinancialSampler::new(&inputs.market)?,
            horizon_months,
            start_month: inputs.valuation_date.month(),
            receivable_flows,
            incentive_flows,
            predictors: HashMap::new(),
        })
    }

    pub fn with_predictor(mut self, asset: AssetId, predictor: Arc<dyn ProductionPredictor>) -> Self {
        self.predictors.insert(asset, predictor);
        self
    }

    fn capacity_factor(&self, asset: &Asset, calendar_month: usize, weather: &WeatherSample) -> f64 {
        self.predictors
            .get(&asset.id)
            .and_then(|p| p.capacity_factor(asset, calendar_month, weather))
            .filter(|cf| cf.is_finite())
            .map(|cf| cf.clamp(0.0, 1.0))
            .unwrap_or_else(|| effective_capacity_factor(asset, weather))
    }

    /// Net production cash flow of all assets for one month.
    fn production_flow(&self, month: u32, weather: &WeatherSample, fin: &FinancialSample) -> f64 {
        let idx = (month - 1) as usize;
        let calendar = calendar_month_index(self.start_month, month);
        let hours = HOURS_IN_MONTH[calendar];
        let energy_price = fin.energy_prices[idx] * (1.0 + fin.inflation).powf(month as f64 / 12.0);
        let carbon_price = fin.carbon_prices[idx];
        let rec_price = self.financial.model().rec_price;

        self.assets
            .iter()
            .map(|asset| {
                let mwh = asset.capacity_mw * self.capacity_factor(asset, calendar, weather) * hours;
                let revenue = mwh * (energy_price + rec_price + asset.carbon_offset_per_mwh * carbon_price);
                revenue - asset.monthly_operating_cost
            })
            .sum()
    }

    fn discount(rate: f64, month: u32) -> f64 {
        (1.0 + rate).powf(-(month as f64) / 12.0)
    }

    /// Expected monthly flows under mean weather and mean price paths.
    pub fn expected_months(&self) -> Vec<ExpectedMonth> {
        let fin = self.financial.expected(self.horizon_months);
        (1..=self.horizon_months)
            .map(|month| {
                let weather = self.weather.expected(calendar_month_index(self.start_month, month));
                let idx = (month - 1) as usize;
                ExpectedMonth {
                    month,
                    production: self.production_flow(month, &weather, &fin),
                    receivables: self.receivable_flows[idx],
                    incentives: self.incentive_flows[idx],
                }
            })
            .collect()
    }

    /// NPV of the expected flows at the mean discount rate.
    pub fn expected_npv(&self) -> f64 {
        let rate = self.financial.expected(0).discount_rate;
        self.expected_months()
            .iter()
            .map(|m| (m.production + m.receivables + m.incentives) * Self::discount(rate, m.month))
            .sum()
    }
}

impl IterationModel for ClimateCashFlowModel {
    fn simulate(&self, rng: &mut ChaCha20Rng) -> Result<f64, IterationError> {
        let fin = self.financial.sample(rng, self.horizon_months);
        let mut npv = 0.0;
        for month in 1..=self.horizon_months {
            let weather = self.weather.sample(rng, calendar_month_index(self.start_month, month));
            let idx = (month - 1) as usize;
            let flow = self.production_flow(month, &weather, &fin)
                + self.receivable_flows[idx]
                + self.incentive_flows[idx];
            npv += flow * Self::discount(fin.discount_rate, month);
        }
        if npv.is_finite() { Ok(npv) } else { Err(IterationError::NonFinite(npv)) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::Rng;
    use rand_distr::Distribution;

    use super::*;
    use crate::providers::IncentiveType;
    use crate::sampling::Normal;
    use crate::types::{CounterpartyId, EntityId};

    struct NormalModel(Normal);

    impl IterationModel for NormalModel {
        fn simulate(&self, rng: &mut ChaCha20Rng) -> Result<f64, IterationError> {
            Ok(self.0.sample(rng))
        }
    }

    /// Fails whenever the first uniform draw is below `p`.
    struct FlakyModel {
        p: f64,
        failures: AtomicUsize,
    }

    impl IterationModel for FlakyModel {
        fn simulate(&self, rng: &mut ChaCha20Rng) -> Result<f64, IterationError> {
            if rng.random::<f64>() < self.p {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(IterationError::Model("transient".to_string()));
            }
            Ok(1.0)
        }
    }

    fn config(iterations: usize, seed: u64) -> MonteCarloConfig {
        MonteCarloConfig { iterations, seed: Some(seed), ..MonteCarloConfig::default() }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn solar() -> Asset {
        Asset {
            id: AssetId(1),
            name: "Mojave Solar".to_string(),
            asset_type: AssetType::Solar,
            location: "Barstow, CA".to_string(),
            capacity_mw: 20.0,
            base_capacity_factor: 0.25,
            monthly_operating_cost: 30_000.0,
            carbon_offset_per_mwh: 0.4,
        }
    }

    fn wind() -> Asset {
        Asset {
            id: AssetId(2),
            name: "Panhandle Wind".to_string(),
            asset_type: AssetType::Wind,
            location: "Amarillo, TX".to_string(),
            capacity_mw: 30.0,
            base_capacity_factor: 0.35,
            monthly_operating_cost: 45_000.0,
            carbon_offset_per_mwh: 0.45,
        }
    }

    fn inputs() -> CashFlowInputs {
        CashFlowInputs {
            assets: vec![solar(), wind()],
            receivables: vec![Receivable {
                id: EntityId(10),
                asset_id: AssetId(1),
                counterparty_id: CounterpartyId(5),
                amount: 100_000.0,
                due_date: date(2025, 3, 31),
                risk_score: Some(40.0),
                discount_rate: None,
            }],
            incentives: vec![Incentive {
                asset_id: AssetId(2),
                incentive_type: IncentiveType::TaxCredit,
                amount: 50_000.0,
                expected_date: date(2025, 6, 1),
                policy_risk: 0.2,
            }],
            valuation_date: date(2025, 1, 15),
            climate: SeasonalClimate::canonical(),
            market: MarketModel::canonical(),
            credit_loss_severity: 0.5,
        }
    }

    #[test]
    fn normal_model_mean_within_three_standard_errors() {
        let model = NormalModel(Normal::new(1_000.0, 100.0).unwrap());
        let result = run(&model, &config(10_000, 42)).unwrap();
        assert_eq!(result.simulations, 10_000);
        assert!(
            (result.statistics.mean - 1_000.0).abs() < 3.0,
            "mean {:.3}",
            result.statistics.mean
        );
        assert!((result.statistics.std_dev - 100.0).abs() < 5.0);
        assert!(result.statistics.skewness.abs() < 0.1);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let model = ClimateCashFlowModel::new(&inputs(), 12).unwrap();
        let a = run(&model, &config(500, 7)).unwrap();
        let b = run(&model, &config(500, 7)).unwrap();
        assert_eq!(a, b);
        let c = run(&model, &config(500, 8)).unwrap();
        assert_ne!(a.statistics.mean, c.statistics.mean);
    }

    #[test]
    fn unseeded_run_reports_its_seed() {
        let model = NormalModel(Normal::new(0.0, 1.0).unwrap());
        let cfg = MonteCarloConfig { iterations: 200, ..MonteCarloConfig::default() };
        let first = run(&model, &cfg).unwrap();
        let replay = run(&model, &MonteCarloConfig { seed: Some(first.seed), ..cfg }).unwrap();
        assert_eq!(first.statistics, replay.statistics);
    }

    #[test]
    fn failed_iterations_are_retried_not_dropped() {
        let model = FlakyModel { p: 0.2, failures: AtomicUsize::new(0) };
        let result = run(&model, &MonteCarloConfig { max_retries: 10, ..config(2_000, 3) }).unwrap();
        assert_eq!(result.simulations, 2_000);
        assert!(result.retried_iterations > 0);
        assert!(model.failures.load(Ordering::Relaxed) >= result.retried_iterations);
    }

    #[test]
    fn persistent_failure_fails_the_run() {
        let model = FlakyModel { p: 1.1, failures: AtomicUsize::new(0) };
        let err = run(&model, &MonteCarloConfig { max_retries: 2, ..config(10, 3) }).unwrap_err();
        assert!(matches!(err, SimulationError::IterationFailed { attempts: 3, .. }), "{err}");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let model = NormalModel(Normal::new(0.0, 1.0).unwrap());
        for cfg in [
            MonteCarloConfig { iterations: 0, ..MonteCarloConfig::default() },
            MonteCarloConfig { confidence: 1.0, ..MonteCarloConfig::default() },
            MonteCarloConfig { horizon_months: 0, ..MonteCarloConfig::default() },
        ] {
            assert!(matches!(run(&model, &cfg), Err(SimulationError::InvalidConfig(_))));
        }
    }

    #[test]
    fn percentiles_ordered_for_climate_model() {
        let model = ClimateCashFlowModel::new(&inputs(), 24).unwrap();
        let r = run(&model, &config(1_000, 11)).unwrap();
        let p = &r.percentiles;
        assert!(p.p5 <= p.p10 && p.p10 <= p.p25 && p.p25 <= p.p50);
        assert!(p.p50 <= p.p75 && p.p75 <= p.p90 && p.p90 <= p.p95);
        assert!(r.risk_metrics.cvar <= r.risk_metrics.var_95);
        assert_eq!(r.scenarios.worst_case, p.p5);
    }

    /// Solar output is close to linear in the sampled variables, so the
    /// simulated mean should sit near the expected-path NPV. The wind power
    /// curve is convex and is left out.
    #[test]
    fn simulated_mean_near_expected_npv_for_solar() {
        let mut inp = inputs();
        inp.assets.truncate(1);
        let model = ClimateCashFlowModel::new(&inp, 12).unwrap();
        let r = run(&model, &config(4_000, 21)).unwrap();
        let expected = model.expected_npv();
        assert!(expected > 0.0);
        assert!(
            (r.statistics.mean - expected).abs() < expected.abs() * 0.05,
            "mean {:.0} vs expected {:.0}",
            r.statistics.mean,
            expected
        );
    }

    #[test]
    fn receivables_and_incentives_are_risk_adjusted_into_their_months() {
        let model = ClimateCashFlowModel::new(&inputs(), 12).unwrap();
        let months = model.expected_months();
        // Due 31 March, valuation in January → month 3; recovery 1 − 0.4 × 0.5.
        assert!((months[2].receivables - 80_000.0).abs() < 1e-9);
        // Expected 1 June → month 6; 1 − 0.2 policy risk.
        assert!((months[5].incentives - 40_000.0).abs() < 1e-9);
        let other: f64 = months.iter().map(|m| m.receivables + m.incentives).sum();
        assert!((other - 120_000.0).abs() < 1e-9);
    }

    #[test]
    fn flows_beyond_horizon_are_excluded() {
        let model = ClimateCashFlowModel::new(&inputs(), 2).unwrap();
        let months = model.expected_months();
        assert!(months.iter().all(|m| m.receivables == 0.0 && m.incentives == 0.0));
    }

    #[test]
    fn loss_making_portfolio_reports_probability_of_loss() {
        let mut inp = inputs();
        inp.receivables.clear();
        inp.incentives.clear();
        for a in &mut inp.assets {
            a.monthly_operating_cost = 5_000_000.0;
        }
        let model = ClimateCashFlowModel::new(&inp, 12).unwrap();
        let r = run(&model, &config(500, 5)).unwrap();
        assert!(r.risk_metrics.probability_of_loss > 0.99);
        assert!(r.statistics.mean < 0.0);
    }

    struct FixedPredictor(f64);

    impl ProductionPredictor for FixedPredictor {
        fn capacity_factor(&self, _: &Asset, _: usize, _: &WeatherSample) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn predictor_overrides_physical_capacity_factor() {
        let mut inp = inputs();
        inp.assets.truncate(1);
        let idle = ClimateCashFlowModel::new(&inp, 12)
            .unwrap()
            .with_predictor(AssetId(1), Arc::new(FixedPredictor(0.0)));
        let months = idle.expected_months();
        // Zero output: production flow is exactly the negative operating cost.
        assert!(months.iter().all(|m| (m.production + 30_000.0).abs() < 1e-9));
    }

    #[test]
    fn wind_power_curve_shape() {
        let w = |v: f64| WeatherSample { irradiance: 0.0, wind_speed: v, temperature: 15.0, precipitation_days: 0 };
        let a = wind();
        assert_eq!(effective_capacity_factor(&a, &w(2.0)), 0.0);
        assert_eq!(effective_capacity_factor(&a, &w(26.0)), 0.0);
        assert!((effective_capacity_factor(&a, &w(15.0)) - 0.95).abs() < 1e-12);
        let mid = effective_capacity_factor(&a, &w(7.5));
        assert!((mid - 0.125 * 0.95).abs() < 1e-12);
    }

    #[test]
    fn hot_weather_derates_solar() {
        let a = solar();
        let w = |t: f64| WeatherSample { irradiance: 5.0, wind_speed: 0.0, temperature: t, precipitation_days: 0 };
        assert!((effective_capacity_factor(&a, &w(20.0)) - 0.25).abs() < 1e-12);
        assert!((effective_capacity_factor(&a, &w(35.0)) - 0.25 * 0.96).abs() < 1e-12);
    }

    #[test]
    fn negative_asset_parameters_are_rejected() {
        let mut inp = inputs();
        inp.assets[0].capacity_mw = -1.0;
        assert!(matches!(ClimateCashFlowModel::new(&inp, 12), Err(SimulationError::InvalidInput(_))));
    }

    #[test]
    fn inverted_discount_bounds_fail_model_construction() {
        let mut inp = inputs();
        inp.market.discount_rate_floor = 0.3;
        inp.market.discount_rate_cap = 0.1;
        assert!(matches!(
            ClimateCashFlowModel::new(&inp, 12),
            Err(SimulationError::Sampling(SamplingError::InvalidBounds { .. }))
        ));
    }

    #[test]
    fn horizon_month_counts_calendar_months() {
        let v = date(2025, 11, 20);
        assert_eq!(horizon_month(v, date(2025, 11, 1)), 1);
        assert_eq!(horizon_month(v, date(2026, 1, 31)), 3);
        assert_eq!(horizon_month(v, date(2024, 6, 1)), 1);
    }
}
