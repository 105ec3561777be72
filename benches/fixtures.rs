use chrono::{Months, NaiveDate};

use climate_risk::engine::DEFAULT_CREDIT_LOSS_SEVERITY;
use climate_risk::monte_carlo::{CashFlowInputs, ClimateCashFlowModel};
use climate_risk::providers::{Asset, Incentive, IncentiveType, Receivable};
use climate_risk::types::{AssetId, AssetType, CounterpartyId, EntityId};
use climate_risk::variables::{MarketModel, SeasonalClimate};

pub struct Portfolio {
    pub assets: usize,
    pub receivables_per_asset: usize,
}

pub const SMALL: Portfolio = Portfolio { assets: 3, receivables_per_asset: 4 };

pub const MEDIUM: Portfolio = Portfolio { assets: 20, receivables_per_asset: 12 };

pub const LARGE: Portfolio = Portfolio { assets: 100, receivables_per_asset: 24 };

pub fn valuation_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

/// Assets cycle through solar, wind and hydro; receivables fall due monthly.
pub fn build_inputs(portfolio: &Portfolio) -> CashFlowInputs {
    let valuation = valuation_date();
    let types = [AssetType::Solar, AssetType::Wind, AssetType::Hydro];
    let assets: Vec<Asset> = (1..=portfolio.assets)
        .map(|i| Asset {
            id: AssetId(i as u64),
            name: format!("Bench asset {i}"),
            asset_type: types[(i - 1) % 3],
            location: "Bench, TX".to_string(),
            capacity_mw: 25.0,
            base_capacity_factor: 0.3,
            monthly_operating_cost: 35_000.0,
            carbon_offset_per_mwh: 0.4,
        })
        .collect();
    let receivables = assets
        .iter()
        .flat_map(|a| {
            (1..=portfolio.receivables_per_asset).map(move |j| Receivable {
                id: EntityId(a.id.0 * 1_000 + j as u64),
                asset_id: a.id,
                counterparty_id: CounterpartyId(j as u64 % 7),
                amount: 100_000.0,
                due_date: valuation.checked_add_months(Months::new(j as u32)).unwrap(),
                risk_score: Some(20.0 + (j % 5) as f64 * 15.0),
                discount_rate: None,
            })
        })
        .collect();
    let incentives = assets
        .iter()
        .map(|a| Incentive {
            asset_id: a.id,
            incentive_type: IncentiveType::TaxCredit,
            amount: 50_000.0,
            expected_date: valuation.checked_add_months(Months::new(6)).unwrap(),
            policy_risk: 0.1,
        })
        .collect();
    CashFlowInputs {
        assets,
        receivables,
        incentives,
        valuation_date: valuation,
        climate: SeasonalClimate::canonical(),
        market: MarketModel::canonical(),
        credit_loss_severity: DEFAULT_CREDIT_LOSS_SEVERITY,
    }
}

pub fn build_model(portfolio: &Portfolio, horizon_months: u32) -> ClimateCashFlowModel {
    ClimateCashFlowModel::new(&build_inputs(portfolio), horizon_months).unwrap()
}
