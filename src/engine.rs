//! The risk engine facade.
//!
//! `RiskEngine` ties the calculators, scorer, change detector and scheduler to
//! the external collaborators. Provider failures never fail a calculation:
//! they are logged and the affected calculator runs on its fallback path.
//! Single-entity calls return a complete calculation or one typed error;
//! batch calls always return a summary.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::{Alert, detect_alerts};
use crate::components::{Assessed, RiskComponentResult, credit_risk, policy_risk, production_risk};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::monte_carlo::{
    self, CashFlowInputs, ClimateCashFlowModel, MonteCarloConfig, MonteCarloResult, ProductionPredictor,
    SimulationError,
};
use crate::providers::{
    Asset, CreditProvider, NewsProvider, NewsQuery, ProviderError, RiskStore, StoreError, WeatherProvider,
};
use crate::schedule::{ScheduleEntry, TriggerEvent, calculation_due};
use crate::scoring::{CompositeRiskResult, DiscountRateResult, composite, discount_rate};
use crate::types::{AssetId, AssetType, EntityId, RiskLevel};
use crate::variables::{MarketModel, SeasonalClimate};

/// Fraction of a receivable lost at a composite score of 100.
pub const DEFAULT_CREDIT_LOSS_SEVERITY: f64 = 0.3;

/// Component score above which a component-specific action is recommended.
const COMPONENT_ACTION_SCORE: f64 = 60.0;

/// One complete risk assessment of a receivable. Superseded, never edited,
/// by the next calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCalculation {
    pub entity_id: EntityId,
    pub calculated_at: DateTime<Utc>,
    pub production: Assessed<RiskComponentResult>,
    pub credit: Assessed<RiskComponentResult>,
    pub policy: Assessed<RiskComponentResult>,
    pub composite: CompositeRiskResult,
    pub discount_rate: DiscountRateResult,
    pub recommendations: Vec<String>,
    pub alerts: Vec<Alert>,
    pub next_review_date: DateTime<Utc>,
}

impl RiskCalculation {
    pub fn is_degraded(&self) -> bool {
        self.production.is_degraded() || self.credit.is_degraded() || self.policy.is_degraded()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub entity_id: EntityId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub alerts_raised: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    fn record(mut self, entity_id: EntityId, outcome: Result<RiskCalculation, EngineError>) -> Self {
        self.processed += 1;
        match outcome {
            Ok(calc) => {
                self.successful += 1;
                self.alerts_raised += calc.alerts.len();
            }
            Err(e) => {
                error!(%entity_id, error = %e, "risk calculation failed");
                self.failed += 1;
                self.failures.push(BatchFailure { entity_id, error: e.to_string() });
            }
        }
        self
    }
}

/// Actions implied by a calculation's level and components.
pub fn recommendations(
    composite: &CompositeRiskResult,
    production: &Assessed<RiskComponentResult>,
    credit: &Assessed<RiskComponentResult>,
    policy: &Assessed<RiskComponentResult>,
) -> Vec<String> {
    let mut out = Vec::new();
    match composite.level {
        RiskLevel::Critical => {
            out.push("Immediate mitigation required: consider hedging, sale of the receivable, or a collateral call".into())
        }
        RiskLevel::High => out.push("Enhanced monitoring: review weekly and tighten exposure limits".into()),
        _ => {}
    }
    if production.value().score > COMPONENT_ACTION_SCORE {
        out.push("Consider weather-indexed production insurance".into());
    }
    if credit.value().score > COMPONENT_ACTION_SCORE {
        out.push("Request additional collateral or a parent guarantee from the counterparty".into());
    }
    if policy.value().score > COMPONENT_ACTION_SCORE {
        out.push("Monitor regulatory developments and incentive program changes".into());
    }
    for (name, component) in [("production", production), ("credit", credit), ("policy", policy)] {
        if let Some(reason) = component.reason() {
            out.push(format!("Refresh {name} data before relying on this assessment ({reason})"));
        }
    }
    if out.is_empty() && composite.level == RiskLevel::Low {
        out.push("Standard monitoring".into());
    }
    out
}

fn news_query(asset: &Asset, window_days: u32) -> NewsQuery {
    let technology = match asset.asset_type {
        AssetType::Solar => "solar",
        AssetType::Wind => "wind",
        AssetType::Hydro => "hydropower",
        AssetType::Other => "renewable",
    };
    NewsQuery {
        keywords: vec![format!("{technology} incentive"), format!("{technology} regulation"), asset.location.clone()],
        sectors: vec!["renewable energy".into(), technology.into()],
        window_days,
    }
}

pub struct RiskEngine {
    config: Arc<EngineConfig>,
    store: Arc<dyn RiskStore>,
    weather: Arc<dyn WeatherProvider>,
    credit: Arc<dyn CreditProvider>,
    news: Arc<dyn NewsProvider>,
    climate: SeasonalClimate,
    market: MarketModel,
    predictors: HashMap<AssetId, Arc<dyn ProductionPredictor>>,
}

impl RiskEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RiskStore>,
        weather: Arc<dyn WeatherProvider>,
        credit: Arc<dyn CreditProvider>,
        news: Arc<dyn NewsProvider>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(RiskEngine {
            config: Arc::new(config),
            store,
            weather,
            credit,
            news,
            climate: SeasonalClimate::canonical(),
            market: MarketModel::canonical(),
            predictors: HashMap::new(),
        })
    }

    pub fn with_climate(mut self, climate: SeasonalClimate) -> Self {
        self.climate = climate;
        self
    }

    pub fn with_market(mut self, market: MarketModel) -> Self {
        self.market = market;
        self
    }

    pub fn with_predictor(mut self, asset: AssetId, predictor: Arc<dyn ProductionPredictor>) -> Self {
        self.predictors.insert(asset, predictor);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Provider call under the configured timeout; failures become `None`.
    async fn fetch<T>(
        &self,
        source: &'static str,
        entity_id: EntityId,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Option<T> {
        let timeout_ms = self.config.batch.provider_timeout_ms;
        let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout_ms)),
        };
        match outcome {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(%entity_id, source, error = %e, "provider call failed; using fallback data");
                None
            }
        }
    }

    pub async fn calculate_risk(&self, id: EntityId, force: bool) -> Result<RiskCalculation, EngineError> {
        self.calculate_risk_at(id, force, Utc::now()).await
    }

    /// Calculate (or, when not due and not forced, return the latest) risk
    /// assessment of receivable `id` as of `now`.
    #[instrument(skip(self), fields(entity_id = %id))]
    pub async fn calculate_risk_at(
        &self,
        id: EntityId,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<RiskCalculation, EngineError> {
        let receivable = self.store.receivable(id).await?.ok_or(EngineError::EntityNotFound(id))?;
        let asset = self
            .store
            .asset(receivable.asset_id)
            .await?
            .ok_or(EngineError::AssetNotFound(receivable.asset_id))?;
        let previous = self.store.latest_calculation(id).await?;

        if !force && let Some(prev) = previous.as_ref() {
            let triggers = self.pending_triggers(id, prev.calculated_at, now).await?;
            let due = calculation_due(Some(prev.next_review_date), &triggers, &self.config.triggers, now);
            if !due.is_due() {
                debug!(next_review = %prev.next_review_date, "calculation not due; returning latest");
                return Ok(prev.clone());
            }
            debug!(?due, "recalculating");
        }

        let profile = self.store.counterparty(receivable.counterparty_id).await?;
        let query = news_query(&asset, self.config.batch.news_window_days);
        let (weather, credit_report, news) = tokio::join!(
            self.fetch("weather", id, self.weather.weather(&asset.location, self.config.batch.weather_forecast_days)),
            self.fetch("credit", id, self.credit.credit_rating(receivable.counterparty_id)),
            self.fetch("news", id, self.news.news(&query)),
        );

        let production = production_risk(&asset, weather.as_ref(), now);
        let credit = credit_risk(profile.as_ref(), credit_report.as_ref(), now);
        let policy = policy_risk(&asset, news.as_ref(), now);

        let composite = composite(
            production.value(),
            credit.value(),
            policy.value(),
            &self.config.weights,
            &self.config.thresholds,
        );
        let previous_rate = previous.as_ref().map(|p| p.discount_rate.calculated).or(receivable.discount_rate);
        let discount = discount_rate(&composite, previous_rate, self.config.market_adjustment, &self.config.discount);

        let mut calculation = RiskCalculation {
            entity_id: id,
            calculated_at: now,
            recommendations: recommendations(&composite, &production, &credit, &policy),
            next_review_date: self.config.cadence.next_review_date(composite.level, now),
            production,
            credit,
            policy,
            composite,
            discount_rate: discount,
            alerts: Vec::new(),
        };
        calculation.alerts = detect_alerts(&calculation, previous.as_ref(), &self.config.alerts, now);

        info!(
            score = calculation.composite.score,
            level = %calculation.composite.level,
            confidence = calculation.composite.confidence,
            discount_rate = calculation.discount_rate.calculated,
            alerts = calculation.alerts.len(),
            degraded = calculation.is_degraded(),
            "risk calculated"
        );

        if let Err(source) = self.persist(&calculation, now).await {
            return Err(EngineError::Persistence { calculation: Box::new(calculation), source });
        }
        Ok(calculation)
    }

    /// Triggers reported after `last_calculated` and still inside their window.
    async fn pending_triggers(
        &self,
        id: EntityId,
        last_calculated: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TriggerEvent>, StoreError> {
        let windows = &self.config.triggers;
        let events = self.store.trigger_events(id, windows.earliest_active(now)).await?;
        Ok(events.into_iter().filter(|e| e.reported_at > last_calculated && windows.is_active(e, now)).collect())
    }

    /// The calculation log is written last: a calculation only becomes the
    /// latest once the receivable and its schedule reflect it.
    async fn persist(&self, calculation: &RiskCalculation, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.store
            .update_receivable_risk(
                calculation.entity_id,
                calculation.composite.score,
                calculation.discount_rate.calculated,
            )
            .await?;
        let entry =
            ScheduleEntry::for_level(calculation.entity_id, calculation.composite.level, &self.config.cadence, now);
        self.store.save_schedule(&entry).await?;
        self.store.save_calculation(calculation).await
    }

    pub async fn calculate_batch(&self, ids: &[EntityId]) -> BatchSummary {
        self.calculate_batch_at(ids, Utc::now()).await
    }

    /// Calculate `ids` in groups of `batch.concurrency`, pausing between
    /// groups. Individual failures are counted, never propagated.
    pub async fn calculate_batch_at(&self, ids: &[EntityId], now: DateTime<Utc>) -> BatchSummary {
        let groups: Vec<&[EntityId]> = ids.chunks(self.config.batch.concurrency.max(1)).collect();
        let pause = Duration::from_millis(self.config.batch.pause_ms);
        let mut summary = BatchSummary::default();

        for (i, group) in groups.iter().enumerate() {
            let outcomes = join_all(group.iter().map(|&id| self.calculate_risk_at(id, false, now))).await;
            summary = group.iter().zip(outcomes).fold(summary, |s, (&id, outcome)| s.record(id, outcome));
            debug!(group = i + 1, groups = groups.len(), processed = summary.processed, "batch group complete");
            if i + 1 < groups.len() && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        summary
    }

    pub async fn run_due_calculations(&self) -> Result<BatchSummary, EngineError> {
        self.run_due_calculations_at(Utc::now()).await
    }

    pub async fn run_due_calculations_at(&self, now: DateTime<Utc>) -> Result<BatchSummary, EngineError> {
        let mut due = self.store.due_entities(now).await?;
        let scheduled = due.len();
        for id in self.store.triggered_entities(self.config.triggers.earliest_active(now)).await? {
            if due.contains(&id) {
                continue;
            }
            let triggered = match self.store.latest_calculation(id).await? {
                Some(last) => !self.pending_triggers(id, last.calculated_at, now).await?.is_empty(),
                None => true,
            };
            if triggered {
                due.push(id);
            }
        }
        info!(due = due.len(), triggered = due.len() - scheduled, "running due risk calculations");
        let summary = self.calculate_batch_at(&due, now).await;
        info!(
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            alerts = summary.alerts_raised,
            "due calculations complete"
        );
        Ok(summary)
    }

    /// Assets, receivables and incentives of `asset_ids`, ready for the
    /// climate cash-flow model.
    pub async fn cash_flow_inputs(
        &self,
        asset_ids: &[AssetId],
        valuation_date: NaiveDate,
    ) -> Result<CashFlowInputs, EngineError> {
        if asset_ids.is_empty() {
            return Err(SimulationError::InvalidInput("no assets selected".into()).into());
        }
        let mut inputs = CashFlowInputs {
            assets: Vec::with_capacity(asset_ids.len()),
            receivables: Vec::new(),
            incentives: Vec::new(),
            valuation_date,
            climate: self.climate.clone(),
            market: self.market.clone(),
            credit_loss_severity: DEFAULT_CREDIT_LOSS_SEVERITY,
        };
        for &id in asset_ids {
            let asset = self.store.asset(id).await?.ok_or(EngineError::AssetNotFound(id))?;
            inputs.assets.push(asset);
            inputs.receivables.extend(self.store.receivables_for_asset(id).await?);
            inputs.incentives.extend(self.store.incentives_for_asset(id).await?);
        }
        Ok(inputs)
    }

    /// Build the climate cash-flow model for `asset_ids`, with any
    /// registered production predictors attached.
    pub async fn cash_flow_model(
        &self,
        asset_ids: &[AssetId],
        valuation_date: NaiveDate,
        horizon_months: u32,
    ) -> Result<ClimateCashFlowModel, EngineError> {
        let inputs = self.cash_flow_inputs(asset_ids, valuation_date).await?;
        let mut model = ClimateCashFlowModel::new(&inputs, horizon_months)?;
        for (&id, predictor) in &self.predictors {
            model = model.with_predictor(id, Arc::clone(predictor));
        }
        Ok(model)
    }

    pub async fn run_monte_carlo_forecast(
        &self,
        asset_ids: &[AssetId],
        config: MonteCarloConfig,
    ) -> Result<MonteCarloResult, EngineError> {
        self.run_monte_carlo_forecast_at(asset_ids, config, Utc::now().date_naive()).await
    }

    /// Monte Carlo NPV forecast over `asset_ids`. The CPU-bound run happens on
    /// the blocking pool so it does not stall the async runtime.
    pub async fn run_monte_carlo_forecast_at(
        &self,
        asset_ids: &[AssetId],
        config: MonteCarloConfig,
        valuation_date: NaiveDate,
    ) -> Result<MonteCarloResult, EngineError> {
        config.validate()?;
        let model = self.cash_flow_model(asset_ids, valuation_date, config.horizon_months).await?;
        info!(assets = asset_ids.len(), iterations = config.iterations, "starting Monte Carlo forecast");
        let result = tokio::task::spawn_blocking(move || monte_carlo::run(&model, &config))
            .await
            .map_err(|e| EngineError::TaskAborted(e.to_string()))??;
        info!(
            mean = result.statistics.mean,
            var_95 = result.risk_metrics.var_95,
            probability_of_loss = result.risk_metrics.probability_of_loss,
            seed = result.seed,
            "Monte Carlo forecast complete"
        );
        Ok(result)
    }
}
