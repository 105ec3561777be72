//! Risk scoring and Monte Carlo cash-flow forecasting for climate receivables:
//! future payments backed by renewable-energy production.

pub mod alerts;
pub mod analysis;
pub mod components;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod memory;
pub mod monte_carlo;
pub mod providers;
pub mod sampling;
pub mod scenario;
pub mod schedule;
pub mod scoring;
pub mod types;
pub mod variables;

pub use engine::{BatchSummary, RiskCalculation, RiskEngine};
pub use error::EngineError;
