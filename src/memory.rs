//! In-memory collaborators: a [`RiskStore`] backed by hash maps and static
//! weather/credit/news providers. Used by the demo binary and by tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::engine::RiskCalculation;
use crate::providers::{
    Asset, CounterpartyProfile, CreditProvider, CreditReport, Incentive, NewsProvider, NewsQuery, NewsReport,
    ProviderError, Receivable, RiskStore, StoreError, WeatherProvider, WeatherReport,
};
use crate::schedule::{ScheduleEntry, TriggerEvent};
use crate::types::{AssetId, CounterpartyId, EntityId};

/// Static records loaded into a store at construction.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    pub assets: Vec<Asset>,
    pub receivables: Vec<Receivable>,
    pub counterparties: Vec<CounterpartyProfile>,
    pub incentives: Vec<Incentive>,
}

#[derive(Default)]
struct StoreState {
    assets: HashMap<AssetId, Asset>,
    receivables: HashMap<EntityId, Receivable>,
    counterparties: HashMap<CounterpartyId, CounterpartyProfile>,
    incentives: Vec<Incentive>,
    /// Append-only; the last entry is the latest calculation.
    calculations: HashMap<EntityId, Vec<RiskCalculation>>,
    schedules: HashMap<EntityId, ScheduleEntry>,
    triggers: HashMap<EntityId, Vec<TriggerEvent>>,
    rejected_writes: HashSet<EntityId>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new(portfolio: Portfolio) -> Self {
        let state = StoreState {
            assets: portfolio.assets.into_iter().map(|a| (a.id, a)).collect(),
            receivables: portfolio.receivables.into_iter().map(|r| (r.id, r)).collect(),
            counterparties: portfolio.counterparties.into_iter().map(|c| (c.id, c)).collect(),
            incentives: portfolio.incentives,
            ..StoreState::default()
        };
        InMemoryStore { state: RwLock::new(state) }
    }

    pub async fn report_trigger(&self, id: EntityId, event: TriggerEvent) {
        self.state.write().await.triggers.entry(id).or_default().push(event);
    }

    /// Make every subsequent write for `id` fail.
    pub async fn reject_writes_for(&self, id: EntityId) {
        self.state.write().await.rejected_writes.insert(id);
    }

    pub async fn accept_writes_for(&self, id: EntityId) {
        self.state.write().await.rejected_writes.remove(&id);
    }

    /// Full calculation history for `id`, oldest first.
    pub async fn history(&self, id: EntityId) -> Vec<RiskCalculation> {
        self.state.read().await.calculations.get(&id).cloned().unwrap_or_default()
    }
}

impl StoreState {
    fn check_writable(&self, id: EntityId) -> Result<(), StoreError> {
        if self.rejected_writes.contains(&id) {
            return Err(StoreError::WriteRejected(id, "store is read-only for this entity".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RiskStore for InMemoryStore {
    async fn receivable(&self, id: EntityId) -> Result<Option<Receivable>, StoreError> {
        Ok(self.state.read().await.receivables.get(&id).cloned())
    }

    async fn asset(&self, id: AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.state.read().await.assets.get(&id).cloned())
    }

    async fn counterparty(&self, id: CounterpartyId) -> Result<Option<CounterpartyProfile>, StoreError> {
        Ok(self.state.read().await.counterparties.get(&id).cloned())
    }

    async fn receivables_for_asset(&self, id: AssetId) -> Result<Vec<Receivable>, StoreError> {
        let state = self.state.read().await;
        let mut out: Vec<Receivable> = state.receivables.values().filter(|r| r.asset_id == id).cloned().collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    async fn incentives_for_asset(&self, id: AssetId) -> Result<Vec<Incentive>, StoreError> {
        Ok(self.state.read().await.incentives.iter().filter(|i| i.asset_id == id).cloned().collect())
    }

    async fn latest_calculation(&self, id: EntityId) -> Result<Option<RiskCalculation>, StoreError> {
        Ok(self.state.read().await.calculations.get(&id).and_then(|h| h.last()).cloned())
    }

    async fn save_calculation(&self, calculation: &RiskCalculation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_writable(calculation.entity_id)?;
        state.calculations.entry(calculation.entity_id).or_default().push(calculation.clone());
        Ok(())
    }

    async fn update_receivable_risk(&self, id: EntityId, risk_score: f64, discount_rate: f64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_writable(id)?;
        let receivable = state
            .receivables
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("no receivable {id}")))?;
        receivable.risk_score = Some(risk_score);
        receivable.discount_rate = Some(discount_rate);
        Ok(())
    }

    async fn schedule(&self, id: EntityId) -> Result<Option<ScheduleEntry>, StoreError> {
        Ok(self.state.read().await.schedules.get(&id).cloned())
    }

    async fn save_schedule(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_writable(entry.entity_id)?;
        state.schedules.insert(entry.entity_id, entry.clone());
        Ok(())
    }

    /// Never-scheduled receivables first (by id), then overdue schedules by
    /// descending priority and oldest due date.
    async fn due_entities(&self, now: DateTime<Utc>) -> Result<Vec<EntityId>, StoreError> {
        let state = self.state.read().await;
        let mut unscheduled: Vec<EntityId> =
            state.receivables.keys().filter(|id| !state.schedules.contains_key(id)).copied().collect();
        unscheduled.sort();

        let mut overdue: Vec<&ScheduleEntry> = state.schedules.values().filter(|s| s.next_due <= now).collect();
        overdue.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.next_due.cmp(&b.next_due)));

        unscheduled.extend(overdue.into_iter().map(|s| s.entity_id));
        Ok(unscheduled)
    }

    async fn triggered_entities(&self, since: DateTime<Utc>) -> Result<Vec<EntityId>, StoreError> {
        let state = self.state.read().await;
        let mut ids: Vec<EntityId> = state
            .triggers
            .iter()
            .filter(|(_, events)| events.iter().any(|e| e.reported_at >= since))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn trigger_events(&self, id: EntityId, since: DateTime<Utc>) -> Result<Vec<TriggerEvent>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .triggers
            .get(&id)
            .map(|events| events.iter().filter(|e| e.reported_at >= since).cloned().collect())
            .unwrap_or_default())
    }
}

// ── Static providers ────────────────────────────────────────────────────────

async fn respond<T: Clone>(found: Option<&T>, delay: Option<Duration>, what: String) -> Result<T, ProviderError> {
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
    found.cloned().ok_or(ProviderError::Unavailable(what))
}

/// Weather keyed by asset location; unknown locations are unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticWeather {
    reports: HashMap<String, WeatherReport>,
    delay: Option<Duration>,
}

impl StaticWeather {
    pub fn new(reports: HashMap<String, WeatherReport>) -> Self {
        StaticWeather { reports, delay: None }
    }

    /// Respond only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn weather(&self, location: &str, _days: u32) -> Result<WeatherReport, ProviderError> {
        respond(self.reports.get(location), self.delay, format!("no weather for {location}")).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredit {
    reports: HashMap<CounterpartyId, CreditReport>,
}

impl StaticCredit {
    pub fn new(reports: HashMap<CounterpartyId, CreditReport>) -> Self {
        StaticCredit { reports }
    }
}

#[async_trait]
impl CreditProvider for StaticCredit {
    async fn credit_rating(&self, counterparty: CounterpartyId) -> Result<CreditReport, ProviderError> {
        respond(self.reports.get(&counterparty), None, format!("no rating for {counterparty}")).await
    }
}

/// Returns the same report for every query.
#[derive(Debug, Clone, Default)]
pub struct StaticNews {
    report: Option<NewsReport>,
}

impl StaticNews {
    pub fn new(report: Option<NewsReport>) -> Self {
        StaticNews { report }
    }
}

#[async_trait]
impl NewsProvider for StaticNews {
    async fn news(&self, query: &NewsQuery) -> Result<NewsReport, ProviderError> {
        respond(self.report.as_ref(), None, format!("no news for {:?}", query.keywords)).await
    }
}
