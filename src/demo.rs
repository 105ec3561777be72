//! Canonical demo portfolio: three assets, ten receivables, and provider
//! data covering a healthy, a stretched and a distressed counterparty.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};

use crate::memory::{Portfolio, StaticCredit, StaticNews, StaticWeather};
use crate::providers::{
    Asset, CounterpartyProfile, CreditReport, FinancialMetrics, ForecastDay, ImpactLevel, Incentive, IncentiveType,
    NewsArticle, NewsReport, NewsSummary, PaymentHistory, Receivable, WeatherReport,
};
use crate::types::{AssetId, AssetType, CounterpartyId, EntityId};

pub fn assets() -> Vec<Asset> {
    vec![
        Asset {
            id: AssetId(1),
            name: "Mojave Flats Solar".into(),
            asset_type: AssetType::Solar,
            location: "Barstow, CA".into(),
            capacity_mw: 50.0,
            base_capacity_factor: 0.26,
            monthly_operating_cost: 60_000.0,
            carbon_offset_per_mwh: 0.42,
        },
        Asset {
            id: AssetId(2),
            name: "Llano Estacado Wind".into(),
            asset_type: AssetType::Wind,
            location: "Lubbock, TX".into(),
            capacity_mw: 80.0,
            base_capacity_factor: 0.38,
            monthly_operating_cost: 110_000.0,
            carbon_offset_per_mwh: 0.45,
        },
        Asset {
            id: AssetId(3),
            name: "Cascade Run-of-River".into(),
            asset_type: AssetType::Hydro,
            location: "Bend, OR".into(),
            capacity_mw: 15.0,
            base_capacity_factor: 0.45,
            monthly_operating_cost: 25_000.0,
            carbon_offset_per_mwh: 0.40,
        },
    ]
}

pub fn counterparties() -> Vec<CounterpartyProfile> {
    vec![
        CounterpartyProfile {
            id: CounterpartyId(1),
            name: "Pacific Grid Utility".into(),
            credit_score: Some(780),
            credit_rating: Some("AA-".into()),
            on_time_rate: Some(0.98),
        },
        CounterpartyProfile {
            id: CounterpartyId(2),
            name: "Panhandle Retail Energy".into(),
            credit_score: Some(640),
            credit_rating: Some("BB+".into()),
            on_time_rate: Some(0.84),
        },
        CounterpartyProfile {
            id: CounterpartyId(3),
            name: "Northwest Data Centers".into(),
            credit_score: None,
            credit_rating: Some("BBB".into()),
            on_time_rate: None,
        },
    ]
}

/// Ten receivables spread over the three assets, due monthly from `valuation`.
pub fn receivables(valuation: NaiveDate) -> Vec<Receivable> {
    (1..=10u64)
        .map(|i| {
            let asset = (i - 1) % 3 + 1;
            Receivable {
                id: EntityId(i),
                asset_id: AssetId(asset),
                counterparty_id: CounterpartyId(asset),
                amount: 150_000.0 + 25_000.0 * i as f64,
                due_date: valuation.checked_add_months(Months::new(i as u32)).unwrap_or(valuation),
                risk_score: None,
                discount_rate: None,
            }
        })
        .collect()
}

pub fn incentives(valuation: NaiveDate) -> Vec<Incentive> {
    let at = |months: u32| valuation.checked_add_months(Months::new(months)).unwrap_or(valuation);
    vec![
        Incentive {
            asset_id: AssetId(1),
            incentive_type: IncentiveType::TaxCredit,
            amount: 400_000.0,
            expected_date: at(6),
            policy_risk: 0.15,
        },
        Incentive {
            asset_id: AssetId(2),
            incentive_type: IncentiveType::RenewableEnergyCertificate,
            amount: 120_000.0,
            expected_date: at(3),
            policy_risk: 0.10,
        },
        Incentive {
            asset_id: AssetId(3),
            incentive_type: IncentiveType::Grant,
            amount: 75_000.0,
            expected_date: at(9),
            policy_risk: 0.05,
        },
    ]
}

pub fn portfolio(valuation: NaiveDate) -> Portfolio {
    Portfolio {
        assets: assets(),
        receivables: receivables(valuation),
        counterparties: counterparties(),
        incentives: incentives(valuation),
    }
}

fn forecast(start: NaiveDate, days: i64, wind_mph: f64, sunlight: f64, cloud: f64, rain: f64) -> Vec<ForecastDay> {
    (1..=days)
        .map(|d| ForecastDay {
            date: start + Duration::days(d),
            temperature: 22.0,
            wind_speed: wind_mph,
            sunlight_hours: sunlight,
            cloud_cover: cloud,
            precipitation_chance: rain,
        })
        .collect()
}

/// Weather for the solar and wind sites; the hydro site has no live feed.
pub fn weather(today: NaiveDate) -> StaticWeather {
    StaticWeather::new(HashMap::from([
        (
            "Barstow, CA".to_string(),
            WeatherReport {
                temperature: 31.0,
                humidity: 18.0,
                wind_speed: 9.0,
                sunlight_hours: 10.5,
                cloud_cover: 8.0,
                forecast: forecast(today, 7, 8.0, 10.0, 10.0, 2.0),
            },
        ),
        (
            "Lubbock, TX".to_string(),
            WeatherReport {
                temperature: 24.0,
                humidity: 40.0,
                wind_speed: 11.0,
                sunlight_hours: 9.0,
                cloud_cover: 35.0,
                forecast: forecast(today, 7, 6.0, 9.0, 30.0, 10.0),
            },
        ),
    ]))
}

pub fn credit() -> StaticCredit {
    StaticCredit::new(HashMap::from([
        (
            CounterpartyId(1),
            CreditReport {
                credit_score: 785,
                rating: "AA-".into(),
                outlook: "Stable".into(),
                payment_history: PaymentHistory { on_time_rate: 0.98, default_events: 0, average_payment_delay: 2.0 },
                financial_metrics: FinancialMetrics {
                    debt_to_equity: Some(0.9),
                    liquidity_ratio: Some(1.8),
                    profit_margin: Some(0.11),
                },
            },
        ),
        (
            CounterpartyId(2),
            CreditReport {
                credit_score: 610,
                rating: "BB".into(),
                outlook: "Negative".into(),
                payment_history: PaymentHistory { on_time_rate: 0.78, default_events: 1, average_payment_delay: 38.0 },
                financial_metrics: FinancialMetrics {
                    debt_to_equity: Some(2.6),
                    liquidity_ratio: Some(0.85),
                    profit_margin: Some(-0.04),
                },
            },
        ),
    ]))
}

pub fn news(now: DateTime<Utc>) -> StaticNews {
    StaticNews::new(Some(NewsReport {
        articles: vec![NewsArticle {
            impact_level: ImpactLevel::High,
            title: "State commission proposes net-metering revisions".into(),
            description: "Draft rules would reduce export credits for new installations.".into(),
            published_at: now - Duration::days(4),
        }],
        summary: NewsSummary { critical_count: 0, high_impact_count: 1, overall_impact: ImpactLevel::Medium },
    }))
}
