//! Weather and financial variable samplers.
//!
//! `WeatherSampler` draws one month of weather from seasonally scaled
//! distributions; `FinancialSampler` draws one iteration's discount rate,
//! inflation and monthly energy/carbon price paths. Both are built once per
//! simulation run from validated parameter sets and are read-only afterwards,
//! so they can be shared across worker threads.

use rand::Rng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};

use crate::sampling::{Beta, Normal, Poisson, SamplingError, Weibull, standard_normal};

/// Longest precipitation count a month can report.
const MAX_PRECIPITATION_DAYS: u64 = 31;

/// One month's sampled weather.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherSample {
    /// Daily solar irradiance, kWh/m²/day (≈ peak sun hours).
    pub irradiance: f64,
    /// Mean hub-height wind speed, m/s.
    pub wind_speed: f64,
    /// Mean air temperature, °C.
    pub temperature: f64,
    pub precipitation_days: u32,
}

/// Seasonal weather parameters. Monthly arrays are indexed January first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalClimate {
    /// Irradiance at a seasonal factor of 1.0 and a Beta draw of 1.0.
    pub peak_irradiance: f64,
    pub irradiance_alpha: f64,
    pub irradiance_beta: f64,
    pub irradiance_seasonal: [f64; 12],
    pub wind_shape: f64,
    pub wind_scale: f64,
    pub wind_seasonal: [f64; 12],
    pub temperature_mean: [f64; 12],
    pub temperature_std_dev: f64,
    /// Poisson λ for rainy days per month.
    pub precipitation_days: [f64; 12],
}

impl SeasonalClimate {
    /// Mid-latitude northern-hemisphere climate.
    pub fn canonical() -> Self {
        SeasonalClimate {
            peak_irradiance: 7.0,
            irradiance_alpha: 5.0,
            irradiance_beta: 2.0,
            irradiance_seasonal: [0.45, 0.55, 0.70, 0.85, 0.95, 1.00, 1.00, 0.95, 0.80, 0.65, 0.50, 0.42],
            wind_shape: 2.0,
            wind_scale: 7.5,
            wind_seasonal: [1.20, 1.15, 1.10, 1.00, 0.90, 0.80, 0.75, 0.78, 0.90, 1.05, 1.15, 1.20],
            temperature_mean: [2.0, 4.0, 8.0, 12.0, 17.0, 22.0, 25.0, 24.0, 20.0, 14.0, 8.0, 3.0],
            temperature_std_dev: 3.0,
            precipitation_days: [11.0, 10.0, 10.0, 9.0, 9.0, 8.0, 7.0, 7.0, 8.0, 10.0, 11.0, 12.0],
        }
    }
}

impl Default for SeasonalClimate {
    fn default() -> Self {
        Self::canonical()
    }
}

#[derive(Debug, Clone)]
pub struct WeatherSampler {
    peak_irradiance: f64,
    irradiance: Beta,
    irradiance_seasonal: [f64; 12],
    wind: Weibull,
    wind_seasonal: [f64; 12],
    temperature: [Normal; 12],
    precipitation: [Poisson; 12],
}

impl WeatherSampler {
    pub fn new(climate: &SeasonalClimate) -> Result<Self, SamplingError> {
        if !climate.peak_irradiance.is_finite() || climate.peak_irradiance < 0.0 {
            return Err(SamplingError::NonPositive {
                distribution: "SeasonalClimate",
                name: "peak_irradiance",
                value: climate.peak_irradiance,
            });
        }
        let mut temperature = [Normal::new(0.0, 0.0)?; 12];
        let mut precipitation = [Poisson::new(0.0)?; 12];
        for m in 0..12 {
            temperature[m] = Normal::new(climate.temperature_mean[m], climate.temperature_std_dev)?;
            precipitation[m] = Poisson::new(climate.precipitation_days[m])?;
        }
        Ok(WeatherSampler {
            peak_irradiance: climate.peak_irradiance,
            irradiance: Beta::new(climate.irradiance_alpha, climate.irradiance_beta)?,
            irradiance_seasonal: climate.irradiance_seasonal,
            wind: Weibull::new(climate.wind_shape, climate.wind_scale)?,
            wind_seasonal: climate.wind_seasonal,
            temperature,
            precipitation,
        })
    }

    /// Draw one month of weather. `month` is a calendar index, 0 = January.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, month: usize) -> WeatherSample {
        let m = month % 12;
        let irradiance = self.peak_irradiance * self.irradiance.sample(rng) * self.irradiance_seasonal[m];
        let wind_speed = self.wind.sample(rng) * self.wind_seasonal[m];
        let temperature = self.temperature[m].sample(rng);
        let precipitation_days = self.precipitation[m].sample(rng).min(MAX_PRECIPITATION_DAYS) as u32;
        WeatherSample { irradiance, wind_speed, temperature, precipitation_days }
    }

    /// Expected weather for a calendar month, without sampling.
    pub fn expected(&self, month: usize) -> WeatherSample {
        let m = month % 12;
        WeatherSample {
            irradiance: self.peak_irradiance * self.irradiance.mean() * self.irradiance_seasonal[m],
            wind_speed: self.wind.mean() * self.wind_seasonal[m],
            temperature: self.temperature[m].mean(),
            precipitation_days: self.precipitation[m].lambda().round() as u32,
        }
    }
}

/// Financial process parameters. Rates are annual; prices in currency per MWh
/// (energy, RECs) and per tonne (carbon).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketModel {
    pub discount_rate_mean: f64,
    pub discount_rate_std_dev: f64,
    pub discount_rate_floor: f64,
    pub discount_rate_cap: f64,
    pub inflation_mean: f64,
    pub inflation_std_dev: f64,
    pub energy_price_initial: f64,
    /// Ornstein–Uhlenbeck long-run mean.
    pub energy_price_long_run: f64,
    /// Ornstein–Uhlenbeck reversion speed θ.
    pub energy_price_reversion: f64,
    /// Ornstein–Uhlenbeck absolute volatility σ.
    pub energy_price_volatility: f64,
    pub carbon_price_initial: f64,
    pub carbon_price_drift: f64,
    pub carbon_price_volatility: f64,
    pub rec_price: f64,
}

impl MarketModel {
    pub fn canonical() -> Self {
        MarketModel {
            discount_rate_mean: 0.06,
            discount_rate_std_dev: 0.01,
            discount_rate_floor: 0.01,
            discount_rate_cap: 0.25,
            inflation_mean: 0.025,
            inflation_std_dev: 0.005,
            energy_price_initial: 50.0,
            energy_price_long_run: 55.0,
            energy_price_reversion: 0.5,
            energy_price_volatility: 8.0,
            carbon_price_initial: 25.0,
            carbon_price_drift: 0.05,
            carbon_price_volatility: 0.30,
            rec_price: 5.0,
        }
    }
}

impl Default for MarketModel {
    fn default() -> Self {
        Self::canonical()
    }
}

/// One iteration's financial variables. Price paths hold one entry per
/// forecast month; index 0 is month 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSample {
    pub discount_rate: f64,
    pub inflation: f64,
    pub energy_prices: Vec<f64>,
    pub carbon_prices: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct FinancialSampler {
    model: MarketModel,
    discount_rate: Normal,
    inflation: Normal,
}

const DT: f64 = 1.0 / 12.0;

impl FinancialSampler {
    pub fn new(model: &MarketModel) -> Result<Self, SamplingError> {
        for (name, value) in [
            ("energy_price_initial", model.energy_price_initial),
            ("energy_price_long_run", model.energy_price_long_run),
            ("carbon_price_initial", model.carbon_price_initial),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SamplingError::NonPositive { distribution: "MarketModel", name, value });
            }
        }
        for (name, value) in [
            ("energy_price_reversion", model.energy_price_reversion),
            ("energy_price_volatility", model.energy_price_volatility),
            ("carbon_price_drift", model.carbon_price_drift),
            ("carbon_price_volatility", model.carbon_price_volatility),
            ("rec_price", model.rec_price),
        ] {
            if !value.is_finite() {
                return Err(SamplingError::NonFinite { distribution: "MarketModel", name, value });
            }
        }
        let (lower, upper) = (model.discount_rate_floor, model.discount_rate_cap);
        if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
            return Err(SamplingError::InvalidBounds { distribution: "MarketModel", lower, upper });
        }
        Ok(FinancialSampler {
            model: model.clone(),
            discount_rate: Normal::new(model.discount_rate_mean, model.discount_rate_std_dev)?,
            inflation: Normal::new(model.inflation_mean, model.inflation_std_dev)?,
        })
    }

    pub fn model(&self) -> &MarketModel {
        &self.model
    }

    /// Draw one iteration's financial variables over `horizon_months`.
    ///
    /// Energy follows an Euler-stepped Ornstein–Uhlenbeck process floored at
    /// zero; carbon follows geometric Brownian motion with drift.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, horizon_months: u32) -> FinancialSample {
        let m = &self.model;
        let discount_rate = self
            .discount_rate
            .sample(rng)
            .clamp(m.discount_rate_floor, m.discount_rate_cap);
        let inflation = self.inflation.sample(rng);

        let sqrt_dt = DT.sqrt();
        let gbm_drift = (m.carbon_price_drift - 0.5 * m.carbon_price_volatility.powi(2)) * DT;

        let mut energy = m.energy_price_initial;
        let mut carbon = m.carbon_price_initial;
        let mut energy_prices = Vec::with_capacity(horizon_months as usize);
        let mut carbon_prices = Vec::with_capacity(horizon_months as usize);
        for _ in 0..horizon_months {
            energy += m.energy_price_reversion * (m.energy_price_long_run - energy) * DT
                + m.energy_price_volatility * sqrt_dt * standard_normal(rng);
            energy = energy.max(0.0);
            carbon *= (gbm_drift + m.carbon_price_volatility * sqrt_dt * standard_normal(rng)).exp();
            energy_prices.push(energy);
            carbon_prices.push(carbon);
        }

        FinancialSample { discount_rate, inflation, energy_prices, carbon_prices }
    }

    /// Expected values of every variable (no sampling): the OU mean path
    /// μ + (P₀ − μ)e^(−θt) and the GBM mean path S₀e^(μt).
    pub fn expected(&self, horizon_months: u32) -> FinancialSample {
        let m = &self.model;
        let energy_prices = (1..=horizon_months)
            .map(|month| {
                let t = month as f64 * DT;
                m.energy_price_long_run
                    + (m.energy_price_initial - m.energy_price_long_run)
                        * (-m.energy_price_reversion * t).exp()
            })
            .collect();
        let carbon_prices = (1..=horizon_months)
            .map(|month| m.carbon_price_initial * (m.carbon_price_drift * month as f64 * DT).exp())
            .collect();
        FinancialSample {
            discount_rate: m.discount_rate_mean.clamp(m.discount_rate_floor, m.discount_rate_cap),
            inflation: m.inflation_mean,
            energy_prices,
            carbon_prices,
        }
    }
}
