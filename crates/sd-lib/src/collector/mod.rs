//! Per-container stats collection
//!
//! Fetches one stats snapshot per container from the inventory source, in
//! parallel up to a fixed ceiling, and reduces each snapshot to the values
//! rendered on `/metrics`. A failed or timed-out fetch drops that container
//! from the batch and nothing else.

mod stats;

#[cfg(test)]
mod tests;

pub use stats::{cpu_percent, derive, memory_usage_bytes, uptime_seconds};

use crate::inventory::{InventoryError, InventorySource};
use crate::labels::DiscoveredContainer;
use crate::models::{ContainerStats, StatsSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Configuration for stats collection
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum number of stats fetches in flight (default: 64)
    pub concurrency: usize,
    /// Per-fetch timeout; a timeout counts as a failed fetch (default: 10 seconds)
    pub fetch_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: 64,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one collection batch
#[derive(Debug, Default)]
pub struct StatsBatch {
    /// container id -> derived stats, for every fetch that succeeded
    pub stats: HashMap<String, ContainerStats>,
    /// Number of fetches that failed, timed out or panicked
    pub failures: usize,
}

/// Fans stats fetches out over the inventory source
pub struct StatsCollector {
    source: Arc<dyn InventorySource>,
    config: CollectorConfig,
}

impl StatsCollector {
    pub fn new(source: Arc<dyn InventorySource>, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    /// Fetch and derive stats for every container. Returns once every
    /// fetch has finished or failed.
    pub async fn collect(&self, containers: &[DiscoveredContainer], now: DateTime<Utc>) -> StatsBatch {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, container) in containers.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let container_id = container.record.id.clone();
            let fetch_timeout = self.config.fetch_timeout;

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_with_timeout(source.as_ref(), &container_id, fetch_timeout).await,
                    Err(_) => Err(InventoryError::Unavailable(
                        "stats fetch pool closed".to_string(),
                    )),
                };

                (index, result)
            });
        }

        let mut batch = StatsBatch::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(snapshot))) => {
                    let record = &containers[index].record;
                    batch
                        .stats
                        .insert(record.id.clone(), derive(record, &snapshot, now));
                }
                Ok((index, Err(e))) => {
                    batch.failures += 1;
                    let record = &containers[index].record;
                    warn!(
                        container_id = %record.id,
                        container_name = %record.name,
                        error = %e,
                        "Failed to fetch container stats"
                    );
                }
                Err(e) => {
                    batch.failures += 1;
                    warn!(error = %e, "Stats fetch task did not complete");
                }
            }
        }

        debug!(
            collected = batch.stats.len(),
            failures = batch.failures,
            "Stats batch complete"
        );

        batch
    }
}

async fn fetch_with_timeout(
    source: &dyn InventorySource,
    container_id: &str,
    fetch_timeout: Duration,
) -> Result<StatsSnapshot, InventoryError> {
    match tokio::time::timeout(fetch_timeout, source.fetch_stats(container_id)).await {
        Ok(result) => result,
        Err(_) => Err(InventoryError::Timeout {
            container_id: container_id.to_string(),
            timeout: fetch_timeout,
        }),
    }
}
