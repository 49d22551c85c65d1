use sea_orm::DatabaseConnection;

use crate::engine::lifecycle::LifecycleEngine;
use crate::infra::backend::BollardContainerBackend;
use crate::infra::db::{DbClusterStore, DbHostRegistry};

pub type Engine = LifecycleEngine<DbClusterStore, DbHostRegistry, BollardContainerBackend>;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub engine: Engine,
    pub consensus_plugins: Vec<String>,
    pub consensus_modes: Vec<String>,
    pub cluster_sizes: Vec<i32>,
}

impl AppState {
    pub fn validate_shape(
        &self,
        consensus_plugin: &str,
        consensus_mode: &str,
        size: i32,
    ) -> Result<(), crate::error::PoolError> {
        if !self.consensus_plugins.iter().any(|p| p == consensus_plugin) {
            return Err(crate::error::PoolError::InvalidInput(format!(
                "consensus_plugin not allowed: {consensus_plugin}"
            )));
        }
        if !self.consensus_modes.iter().any(|m| m == consensus_mode) {
            return Err(crate::error::PoolError::InvalidInput(format!(
                "consensus_mode not allowed: {consensus_mode}"
            )));
        }
        if !self.cluster_sizes.contains(&size) {
            return Err(crate::error::PoolError::InvalidInput(format!(
                "size not allowed: {size}"
            )));
        }
        Ok(())
    }
}
