use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::RiskCalculation;
use crate::monte_carlo::SimulationError;
use crate::providers::StoreError;
use crate::types::{AssetId, EntityId};

/// Errors surfaced by the engine's single-entity and forecast entrypoints.
/// Batch entrypoints count these per entity instead of returning them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("receivable {0} not found")]
    EntityNotFound(EntityId),

    #[error("asset {0} not found")]
    AssetNotFound(AssetId),

    #[error("store read failed: {0}")]
    Store(#[from] StoreError),

    /// The calculation completed but could not be written. The computed
    /// result is carried so the caller can retry or log it.
    #[error("failed to persist calculation for {}: {source}", .calculation.entity_id)]
    Persistence { calculation: Box<RiskCalculation>, source: StoreError },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("simulation task aborted: {0}")]
    TaskAborted(String),
}

impl EngineError {
    /// The computed-but-unpersisted calculation, if this is a persistence failure.
    pub fn unpersisted(&self) -> Option<&RiskCalculation> {
        match self {
            EngineError::Persistence { calculation, .. } => Some(calculation),
            _ => None,
        }
    }
}
