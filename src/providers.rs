//! Contracts of the collaborators the engine calls but does not own: weather,
//! credit and regulatory-news providers, and the persistent store.
//!
//! Implementations live outside this crate (apart from the in-memory ones in
//! [`crate::memory`]); the engine only depends on these traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::RiskCalculation;
use crate::schedule::{ScheduleEntry, TriggerEvent};
use crate::types::{AssetId, AssetType, CounterpartyId, EntityId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider call timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("write rejected for {0}: {1}")]
    WriteRejected(EntityId, String),
}

// ── Domain records read from the store ──────────────────────────────────────

/// A generating asset backing one or more receivables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub asset_type: AssetType,
    /// Free-text location, e.g. "Bakersfield, CA".
    pub location: String,
    pub capacity_mw: f64,
    /// Nameplate capacity factor under reference conditions, 0–1.
    pub base_capacity_factor: f64,
    /// Fixed operating cost per month.
    pub monthly_operating_cost: f64,
    /// Tonnes of CO₂ displaced per MWh generated.
    pub carbon_offset_per_mwh: f64,
}

/// A future payment backed by an asset's production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivable {
    pub id: EntityId,
    pub asset_id: AssetId,
    pub counterparty_id: CounterpartyId,
    pub amount: f64,
    pub due_date: NaiveDate,
    /// Latest composite score, written back after each calculation.
    pub risk_score: Option<f64>,
    /// Latest discount rate, written back after each calculation.
    pub discount_rate: Option<f64>,
}

/// Cached counterparty fields used when the credit provider is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyProfile {
    pub id: CounterpartyId,
    pub name: String,
    pub credit_score: Option<u32>,
    pub credit_rating: Option<String>,
    pub on_time_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveType {
    RenewableEnergyCertificate,
    TaxCredit,
    Grant,
    CarbonOffset,
}

/// A government or market incentive payable to an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incentive {
    pub asset_id: AssetId,
    pub incentive_type: IncentiveType,
    pub amount: f64,
    pub expected_date: NaiveDate,
    /// Probability, 0–1, that a policy change cancels the payment.
    pub policy_risk: f64,
}

// ── Provider payloads ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temperature: f64,
    /// mph.
    pub wind_speed: f64,
    pub sunlight_hours: f64,
    /// Percent, 0–100.
    pub cloud_cover: f64,
    /// Percent, 0–100.
    pub precipitation_chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature: f64,
    pub humidity: f64,
    /// mph.
    pub wind_speed: f64,
    pub sunlight_hours: f64,
    /// Percent, 0–100.
    pub cloud_cover: f64,
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaymentHistory {
    /// Fraction of payments made on time, 0–1.
    pub on_time_rate: f64,
    pub default_events: u32,
    /// Days.
    pub average_payment_delay: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub debt_to_equity: Option<f64>,
    pub liquidity_ratio: Option<f64>,
    pub profit_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    pub credit_score: u32,
    pub rating: String,
    pub outlook: String,
    pub payment_history: PaymentHistory,
    pub financial_metrics: FinancialMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub impact_level: ImpactLevel,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSummary {
    pub critical_count: u32,
    pub high_impact_count: u32,
    pub overall_impact: ImpactLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsReport {
    pub articles: Vec<NewsArticle>,
    pub summary: NewsSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsQuery {
    pub keywords: Vec<String>,
    pub sectors: Vec<String>,
    pub window_days: u32,
}

// ── Collaborator traits ─────────────────────────────────────────────────────

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn weather(&self, location: &str, days: u32) -> Result<WeatherReport, ProviderError>;
}

#[async_trait]
pub trait CreditProvider: Send + Sync {
    async fn credit_rating(&self, counterparty: CounterpartyId) -> Result<CreditReport, ProviderError>;
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn news(&self, query: &NewsQuery) -> Result<NewsReport, ProviderError>;
}

/// Read/write boundary of the persistent store. The full calculation history
/// is an append-only log owned by the store; the engine reads only the latest.
#[async_trait]
pub trait RiskStore: Send + Sync {
    async fn receivable(&self, id: EntityId) -> Result<Option<Receivable>, StoreError>;

    async fn asset(&self, id: AssetId) -> Result<Option<Asset>, StoreError>;

    async fn counterparty(&self, id: CounterpartyId) -> Result<Option<CounterpartyProfile>, StoreError>;

    async fn receivables_for_asset(&self, id: AssetId) -> Result<Vec<Receivable>, StoreError>;

    async fn incentives_for_asset(&self, id: AssetId) -> Result<Vec<Incentive>, StoreError>;

    async fn latest_calculation(&self, id: EntityId) -> Result<Option<RiskCalculation>, StoreError>;

    async fn save_calculation(&self, calculation: &RiskCalculation) -> Result<(), StoreError>;

    /// Update the receivable's denormalised latest score and rate.
    async fn update_receivable_risk(
        &self,
        id: EntityId,
        risk_score: f64,
        discount_rate: f64,
    ) -> Result<(), StoreError>;

    async fn schedule(&self, id: EntityId) -> Result<Option<ScheduleEntry>, StoreError>;

    async fn save_schedule(&self, entry: &ScheduleEntry) -> Result<(), StoreError>;

    /// Entities whose schedule is due at `now`, most urgent first.
    async fn due_entities(&self, now: DateTime<Utc>) -> Result<Vec<EntityId>, StoreError>;

    /// Entities with at least one trigger event reported at or after `since`,
    /// by id. The engine decides which of them are still due.
    async fn triggered_entities(&self, since: DateTime<Utc>) -> Result<Vec<EntityId>, StoreError>;

    /// Trigger events reported for `id` at or after `since`.
    async fn trigger_events(
        &self,
        id: EntityId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TriggerEvent>, StoreError>;
}
