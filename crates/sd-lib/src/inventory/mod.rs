//! Container inventory sources
//!
//! An inventory source lists the host's containers, fetches live stats for
//! one container and reports disk usage. The Docker Engine backend lives in
//! [`docker`]; tests drive the engine through an in-memory mock.

mod docker;

#[cfg(test)]
pub(crate) mod mock;

pub use docker::DockerInventory;

use crate::models::{ContainerRecord, DiskUsage, StatsSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by an inventory source
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("docker engine request failed: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("inventory unavailable: {0}")]
    Unavailable(String),

    #[error("stats fetch for container {container_id} timed out after {timeout:?}")]
    Timeout {
        container_id: String,
        timeout: Duration,
    },

    #[error("no stats returned for container {0}")]
    NoStats(String),
}

/// Which containers a listing covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerScope {
    /// Every container, stopped ones included
    #[default]
    All,
    /// Only containers currently running
    Running,
}

impl ContainerScope {
    pub fn admits(&self, container: &ContainerRecord) -> bool {
        match self {
            ContainerScope::All => true,
            ContainerScope::Running => container.is_running(),
        }
    }
}

/// Trait for container inventory implementations
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// List every container on the host with labels, ports and state
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, InventoryError>;

    /// Fetch one stats snapshot for a container
    async fn fetch_stats(&self, container_id: &str) -> Result<StatsSnapshot, InventoryError>;

    /// Disk usage facts for containers and volumes
    async fn disk_usage(&self) -> Result<DiskUsage, InventoryError>;

    /// Check that the backend answers
    async fn ping(&self) -> Result<(), InventoryError>;
}
