//! Production, credit and policy risk calculators.
//!
//! Each calculator is a pure function of the entity and whatever external
//! data could be fetched. Missing data selects a fallback path; invalid data
//! is a `ComponentError` that the public entry points turn into a degraded
//! result with an elevated default score. Callers never see an error from
//! this layer.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::providers::{
    Asset, CounterpartyProfile, CreditReport, ImpactLevel, NewsReport, WeatherReport,
};
use crate::types::AssetType;

/// Every component starts from this score before risk tiers are added.
pub const BASE_SCORE: f64 = 10.0;

/// Each unfavourable forecast day adds this much production risk, up to the cap.
const FORECAST_DAY_PENALTY: f64 = 3.0;
const FORECAST_PENALTY_CAP: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskComponentResult {
    /// 0–100.
    pub score: f64,
    pub factors: Vec<String>,
    /// 0–1.
    pub confidence: f64,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// An external provider failed or returned nothing; fallback data was used.
    DataUnavailable(String),
    /// The calculator rejected its inputs; a default score was substituted.
    ComputationError(String),
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::DataUnavailable(s) => write!(f, "data unavailable: {s}"),
            DegradeReason::ComputationError(s) => write!(f, "computation error: {s}"),
        }
    }
}

/// A value computed either from live data or from a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessed<T> {
    Confident(T),
    Degraded(T, DegradeReason),
}

impl<T> Assessed<T> {
    pub fn value(&self) -> &T {
        match self {
            Assessed::Confident(v) | Assessed::Degraded(v, _) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Assessed::Confident(v) | Assessed::Degraded(v, _) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Assessed::Degraded(..))
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Assessed::Confident(_) => None,
            Assessed::Degraded(_, r) => Some(r),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComponentError {
    #[error("invalid {field}: {value}")]
    InvalidInput { field: &'static str, value: f64 },

    #[error("inconsistent data: {0}")]
    Inconsistent(String),
}

fn finite(field: &'static str, value: f64) -> Result<f64, ComponentError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComponentError::InvalidInput { field, value })
    }
}

/// Accumulates tier points and their explanations.
struct ScoreSheet {
    score: f64,
    factors: Vec<String>,
}

impl ScoreSheet {
    fn new() -> Self {
        ScoreSheet { score: BASE_SCORE, factors: Vec::new() }
    }

    fn add(&mut self, points: f64, factor: impl Into<String>) {
        self.score += points;
        self.factors.push(factor.into());
    }

    fn note(&mut self, factor: impl Into<String>) {
        self.factors.push(factor.into());
    }

    fn finish(self, confidence: f64, now: DateTime<Utc>) -> RiskComponentResult {
        RiskComponentResult {
            score: self.score.clamp(0.0, 100.0),
            factors: self.factors,
            confidence: confidence.clamp(0.0, 1.0),
            last_update: now,
        }
    }
}

fn degraded_default(
    component: &'static str,
    score: f64,
    confidence: f64,
    err: ComponentError,
    now: DateTime<Utc>,
) -> Assessed<RiskComponentResult> {
    warn!(component, error = %err, "risk component failed; using default score");
    let result = RiskComponentResult {
        score,
        factors: vec![format!("{component} risk could not be calculated ({err}); default score applied")],
        confidence,
        last_update: now,
    };
    Assessed::Degraded(result, DegradeReason::ComputationError(err.to_string()))
}

// ── Production ──────────────────────────────────────────────────────────────

/// Production risk of `asset` from live weather, or from a seasonal estimate
/// when `weather` is `None`.
pub fn production_risk(
    asset: &Asset,
    weather: Option<&WeatherReport>,
    now: DateTime<Utc>,
) -> Assessed<RiskComponentResult> {
    try_production_risk(asset, weather, now)
        .unwrap_or_else(|e| degraded_default("production", 65.0, 0.3, e, now))
}

fn try_production_risk(
    asset: &Asset,
    weather: Option<&WeatherReport>,
    now: DateTime<Utc>,
) -> Result<Assessed<RiskComponentResult>, ComponentError> {
    if !(asset.capacity_mw.is_finite() && asset.capacity_mw > 0.0) {
        return Err(ComponentError::InvalidInput { field: "capacity_mw", value: asset.capacity_mw });
    }

    let Some(w) = weather else {
        let mut sheet = ScoreSheet::new();
        seasonal_penalty(&mut sheet, asset.asset_type, now.month());
        sheet.note(format!("Live weather unavailable for {}; seasonal estimate used", asset.location));
        return Ok(Assessed::Degraded(
            sheet.finish(0.6, now),
            DegradeReason::DataUnavailable(format!("weather for {}", asset.location)),
        ));
    };

    let sunlight = finite("sunlight_hours", w.sunlight_hours)?;
    let cloud = finite("cloud_cover", w.cloud_cover)?;
    let wind = finite("wind_speed", w.wind_speed)?;

    let mut sheet = ScoreSheet::new();
    match asset.asset_type {
        AssetType::Solar => {
            if sunlight < 4.0 {
                sheet.add(25.0, format!("Low solar irradiance: {sunlight:.1} sunlight hours"));
            } else if sunlight < 6.0 {
                sheet.add(10.0, format!("Moderate solar irradiance: {sunlight:.1} sunlight hours"));
            }
            if cloud > 70.0 {
                sheet.add(20.0, format!("Heavy cloud cover: {cloud:.0}%"));
            } else if cloud > 50.0 {
                sheet.add(8.0, format!("Partial cloud cover: {cloud:.0}%"));
            }
        }
        AssetType::Wind => {
            if wind < 7.0 {
                sheet.add(25.0, format!("Low wind speed: {wind:.1} mph"));
            } else if wind < 15.0 {
                sheet.add(10.0, format!("Below-optimal wind speed: {wind:.1} mph"));
            } else if wind > 55.0 {
                sheet.add(15.0, format!("Excessive wind speed: {wind:.1} mph, curtailment likely"));
            }
        }
        AssetType::Hydro => {
            if w.forecast.is_empty() {
                sheet.add(5.0, "No precipitation outlook available");
            } else {
                let mut total = 0.0;
                for day in &w.forecast {
                    total += finite("precipitation_chance", day.precipitation_chance)?;
                }
                let avg = total / w.forecast.len() as f64;
                if avg < 20.0 {
                    sheet.add(15.0, format!("Dry outlook: {avg:.0}% average precipitation chance"));
                } else if avg < 35.0 {
                    sheet.add(6.0, format!("Below-normal precipitation outlook: {avg:.0}%"));
                }
            }
        }
        AssetType::Other => {}
    }

    let mut unfavourable = 0usize;
    for day in &w.forecast {
        let bad = match asset.asset_type {
            AssetType::Solar => {
                finite("forecast sunlight_hours", day.sunlight_hours)? < 4.0
                    || finite("forecast cloud_cover", day.cloud_cover)? > 70.0
            }
            AssetType::Wind => {
                let v = finite("forecast wind_speed", day.wind_speed)?;
                !(7.0..=55.0).contains(&v)
            }
            AssetType::Hydro => finite("forecast precipitation_chance", day.precipitation_chance)? < 20.0,
            AssetType::Other => false,
        };
        if bad {
            unfavourable += 1;
        }
    }
    if unfavourable > 0 {
        let penalty = (unfavourable as f64 * FORECAST_DAY_PENALTY).min(FORECAST_PENALTY_CAP);
        sheet.add(
            penalty,
            format!("{unfavourable} of {} forecast days unfavourable for generation", w.forecast.len()),
        );
    }

    let confidence = if w.forecast.is_empty() { 0.75 } else { 0.85 };
    Ok(Assessed::Confident(sheet.finish(confidence, now)))
}

/// Seasonal fallback tiers; `month` is 1-based.
fn seasonal_penalty(sheet: &mut ScoreSheet, asset_type: AssetType, month: u32) {
    match (asset_type, month) {
        (AssetType::Solar, 11 | 12 | 1 | 2) => sheet.add(15.0, "Winter season: reduced solar yield"),
        (AssetType::Solar, 3 | 10) => sheet.add(8.0, "Shoulder season: variable solar yield"),
        (AssetType::Wind, 6..=8) => sheet.add(12.0, "Summer season: reduced wind resource"),
        (AssetType::Hydro, 7..=9) => sheet.add(10.0, "Late summer: low river flow"),
        _ => sheet.note("No seasonal production concern"),
    }
}

// ── Credit ──────────────────────────────────────────────────────────────────

/// Credit risk of a counterparty from a live report, or from the stored
/// `profile` when `report` is `None`.
pub fn credit_risk(
    profile: Option<&CounterpartyProfile>,
    report: Option<&CreditReport>,
    now: DateTime<Utc>,
) -> Assessed<RiskComponentResult> {
    try_credit_risk(profile, report, now)
        .unwrap_or_else(|e| degraded_default("credit", 75.0, 0.2, e, now))
}

fn credit_score_tier(sheet: &mut ScoreSheet, score: u32) {
    let points = match score {
        0..500 => 50.0,
        500..600 => 35.0,
        600..650 => 25.0,
        650..700 => 15.0,
        700..750 => 8.0,
        _ => return,
    };
    sheet.add(points, format!("Credit score {score}"));
}

fn rating_tier(sheet: &mut ScoreSheet, rating: &str) {
    let r = rating.trim().to_uppercase();
    if r.contains('D') || r.contains("CC") {
        sheet.add(40.0, format!("Distressed credit rating: {rating}"));
    } else if r.starts_with("BBB") {
        sheet.add(8.0, format!("Lower investment-grade rating: {rating}"));
    } else if r.starts_with('B') {
        sheet.add(20.0, format!("Speculative-grade rating: {rating}"));
    }
}

fn on_time_tier(sheet: &mut ScoreSheet, rate: f64) -> Result<(), ComponentError> {
    let rate = finite("on_time_rate", rate)?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ComponentError::InvalidInput { field: "on_time_rate", value: rate });
    }
    if rate < 0.70 {
        sheet.add(20.0, format!("Poor payment history: {:.0}% on time", rate * 100.0));
    } else if rate < 0.85 {
        sheet.add(10.0, format!("Inconsistent payment history: {:.0}% on time", rate * 100.0));
    }
    Ok(())
}

fn try_credit_risk(
    profile: Option<&CounterpartyProfile>,
    report: Option<&CreditReport>,
    now: DateTime<Utc>,
) -> Result<Assessed<RiskComponentResult>, ComponentError> {
    let mut sheet = ScoreSheet::new();

    let Some(report) = report else {
        let stored = profile.filter(|p| p.credit_score.is_some() || p.credit_rating.is_some());
        let confidence = match stored {
            Some(p) => {
                if let Some(score) = p.credit_score {
                    credit_score_tier(&mut sheet, score);
                }
                if let Some(rating) = &p.credit_rating {
                    rating_tier(&mut sheet, rating);
                }
                if let Some(rate) = p.on_time_rate {
                    on_time_tier(&mut sheet, rate)?;
                }
                sheet.note("Live credit data unavailable; stored counterparty profile used");
                if p.credit_score.is_some() && p.credit_rating.is_some() { 0.7 } else { 0.6 }
            }
            None => {
                sheet.add(25.0, "No credit data on file for counterparty");
                0.6
            }
        };
        let who = profile.map(|p| p.id.to_string()).unwrap_or_else(|| "counterparty".to_string());
        return Ok(Assessed::Degraded(
            sheet.finish(confidence, now),
            DegradeReason::DataUnavailable(format!("credit report for {who}")),
        ));
    };

    credit_score_tier(&mut sheet, report.credit_score);
    rating_tier(&mut sheet, &report.rating);

    match report.outlook.trim().to_lowercase().as_str() {
        "negative" => sheet.add(10.0, "Negative credit outlook"),
        "positive" => sheet.add(-5.0, "Positive credit outlook"),
        _ => {}
    }

    let history = &report.payment_history;
    on_time_tier(&mut sheet, history.on_time_rate)?;
    if history.default_events > 0 {
        sheet.add(
            15.0 * history.default_events as f64,
            format!("{} historical default event(s)", history.default_events),
        );
    }
    let delay = finite("average_payment_delay", history.average_payment_delay)?;
    if delay > 60.0 {
        sheet.add(10.0, format!("Severe payment delays: {delay:.0} days average"));
    } else if delay > 30.0 {
        sheet.add(5.0, format!("Payment delays: {delay:.0} days average"));
    }

    let metrics = &report.financial_metrics;
    if let Some(de) = metrics.debt_to_equity {
        if finite("debt_to_equity", de)? > 2.0 {
            sheet.add(12.0, format!("High leverage: debt/equity {de:.2}"));
        }
    }
    if let Some(lr) = metrics.liquidity_ratio {
        if finite("liquidity_ratio", lr)? < 1.0 {
            sheet.add(15.0, format!("Weak liquidity: ratio {lr:.2}"));
        }
    }
    if let Some(pm) = metrics.profit_margin {
        if finite("profit_margin", pm)? < 0.0 {
            sheet.add(18.0, format!("Negative profit margin: {:.1}%", pm * 100.0));
        }
    }

    Ok(Assessed::Confident(sheet.finish(0.9, now)))
}

// ── Policy ──────────────────────────────────────────────────────────────────

/// Location tokens with known policy exposure.
const JURISDICTION_RISK: &[(&[&str], f64, &str)] = &[
    (&["CA", "California"], 5.0, "California net-metering reform exposure"),
    (&["TX", "Texas"], 8.0, "Texas wholesale market and grid policy exposure"),
    (&["AZ", "Arizona"], 4.0, "Arizona utility rate-design exposure"),
    (&["DE", "Germany"], 3.0, "German feed-in tariff transition"),
    (&["ES", "Spain"], 6.0, "Spanish retroactive remuneration history"),
];

/// Policy risk of `asset` from regulatory news, or from a static outlook table
/// when `news` is `None`.
pub fn policy_risk(
    asset: &Asset,
    news: Option<&NewsReport>,
    now: DateTime<Utc>,
) -> Assessed<RiskComponentResult> {
    try_policy_risk(asset, news, now).unwrap_or_else(|e| degraded_default("policy", 60.0, 0.4, e, now))
}

fn structural_tier(sheet: &mut ScoreSheet, asset_type: AssetType) {
    match asset_type {
        AssetType::Solar => sheet.add(10.0, "Solar investment tax credit step-down schedule"),
        AssetType::Wind => sheet.add(15.0, "Wind production tax credit expiration uncertainty"),
        AssetType::Hydro => sheet.add(5.0, "Hydro relicensing requirements"),
        AssetType::Other => sheet.add(8.0, "Unclassified technology: incentive eligibility uncertain"),
    }
}

fn jurisdiction_tier(sheet: &mut ScoreSheet, location: &str) {
    let tokens: Vec<&str> = location
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    let hit = JURISDICTION_RISK
        .iter()
        .find(|(names, _, _)| names.iter().any(|n| tokens.contains(n)));
    match hit {
        Some((_, points, note)) => sheet.add(*points, *note),
        None => sheet.add(3.0, format!("Jurisdiction policy stability unassessed: {location}")),
    }
}

fn try_policy_risk(
    asset: &Asset,
    news: Option<&NewsReport>,
    now: DateTime<Utc>,
) -> Result<Assessed<RiskComponentResult>, ComponentError> {
    let mut sheet = ScoreSheet::new();

    let Some(news) = news else {
        let (points, note) = match asset.asset_type {
            AssetType::Solar => (12.0, "Static outlook: solar incentive reviews pending"),
            AssetType::Wind => (15.0, "Static outlook: wind credit renewal uncertain"),
            AssetType::Hydro => (8.0, "Static outlook: water-rights review cycle"),
            AssetType::Other => (10.0, "Static outlook: technology-neutral policy drift"),
        };
        sheet.add(points, note);
        structural_tier(&mut sheet, asset.asset_type);
        jurisdiction_tier(&mut sheet, &asset.location);
        sheet.note("Regulatory news unavailable; static policy table used");
        return Ok(Assessed::Degraded(
            sheet.finish(0.5, now),
            DegradeReason::DataUnavailable(format!("regulatory news for {}", asset.asset_type.as_str())),
        ));
    };

    let summary = &news.summary;
    let reported = summary.critical_count as usize + summary.high_impact_count as usize;
    if reported > news.articles.len() {
        return Err(ComponentError::Inconsistent(format!(
            "summary counts {reported} critical/high articles but {} were returned",
            news.articles.len()
        )));
    }

    if summary.critical_count > 0 {
        let headline = news
            .articles
            .iter()
            .find(|a| a.impact_level == ImpactLevel::Critical)
            .map(|a| a.title.as_str())
            .unwrap_or("unnamed");
        sheet.add(25.0, format!("{} critical regulatory development(s): {headline}", summary.critical_count));
    }
    if summary.high_impact_count >= 3 {
        sheet.add(15.0, format!("{} high-impact regulatory developments", summary.high_impact_count));
    } else if summary.high_impact_count > 0 {
        sheet.add(10.0, format!("{} high-impact regulatory development(s)", summary.high_impact_count));
    }
    if summary.critical_count == 0
        && summary.high_impact_count == 0
        && summary.overall_impact >= ImpactLevel::Medium
    {
        sheet.add(5.0, "Moderate regulatory activity");
    }

    structural_tier(&mut sheet, asset.asset_type);
    jurisdiction_tier(&mut sheet, &asset.location);

    Ok(Assessed::Confident(sheet.finish(0.8, now)))
}
