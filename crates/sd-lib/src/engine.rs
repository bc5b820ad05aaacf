//! Request orchestration for `/targets` and `/metrics`
//!
//! Every call lists the inventory afresh; nothing is cached between
//! requests.

use crate::collector::{CollectorConfig, StatsCollector};
use crate::discovery::discovery_records;
use crate::inventory::{ContainerScope, InventoryError, InventorySource};
use crate::labels::{discover, DiscoveredContainer};
use crate::models::DiscoveryRecord;
use crate::observability::{ScrapeMetrics, StructuredLogger};
use crate::render::MetricRenderer;
use crate::schema::LabelSchema;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Errors that abort a whole request
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("metric registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result of one metrics scrape
#[derive(Debug, Clone)]
pub struct Scrape {
    /// Exposition text
    pub body: Vec<u8>,
    /// Containers carrying the job label
    pub discovered: usize,
    /// Containers whose stats were fetched
    pub collected: usize,
    pub failures: usize,
}

/// Configuration for the discovery engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which containers are considered at all (default: all)
    pub scope: ContainerScope,
    /// Add `image`, `image_id` and `container_id` labels (default: true)
    pub identity_labels: bool,
    /// Only emit metrics for containers with a resolved target (default: false)
    pub metrics_require_target: bool,
    /// List discoverable containers without a target on `/targets`, with
    /// base labels only (default: false, such containers are omitted)
    pub include_unresolved_targets: bool,
    pub collector: CollectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope: ContainerScope::All,
            identity_labels: true,
            metrics_require_target: false,
            include_unresolved_targets: false,
            collector: CollectorConfig::default(),
        }
    }
}

/// Discovery and metrics engine over one inventory source
pub struct Engine {
    source: Arc<dyn InventorySource>,
    collector: StatsCollector,
    config: EngineConfig,
    logger: StructuredLogger,
}

impl Engine {
    pub fn new(source: Arc<dyn InventorySource>, config: EngineConfig, logger: StructuredLogger) -> Self {
        let collector = StatsCollector::new(Arc::clone(&source), config.collector.clone());

        Self {
            source,
            collector,
            config,
            logger,
        }
    }

    /// Check that the inventory backend answers
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.source.ping().await?;
        Ok(())
    }

    /// Discoverable containers within the configured scope
    async fn discover(&self) -> Result<Vec<DiscoveredContainer>, InventoryError> {
        let containers = self
            .source
            .list_containers()
            .await?
            .into_iter()
            .filter(|container| self.config.scope.admits(container))
            .collect();

        Ok(discover(containers))
    }

    /// Scrape targets for `/targets`
    pub async fn targets(&self) -> Result<Vec<DiscoveryRecord>, EngineError> {
        let containers = self.discover().await?;
        let records = discovery_records(&containers, self.config.include_unresolved_targets);

        debug!(
            containers = containers.len(),
            targets = records.len(),
            "Built discovery records"
        );

        Ok(records)
    }

    /// Exposition text for `/metrics`
    pub async fn metrics(&self) -> Result<Scrape, EngineError> {
        let started = Instant::now();
        let now = Utc::now();

        let containers = self.discover().await?;
        let disk = self.source.disk_usage().await?;

        let schema = LabelSchema::build(&containers, self.config.identity_labels);
        let renderer = MetricRenderer::new(&schema)?;
        let scrape_metrics = ScrapeMetrics::register(renderer.registry())?;
        let discovered = containers.len();

        let eligible: Vec<DiscoveredContainer> = if self.config.metrics_require_target {
            containers
                .into_iter()
                .filter(|container| container.labels.target.is_some())
                .collect()
        } else {
            containers
        };

        let batch = self.collector.collect(&eligible, now).await;

        for container in &eligible {
            let Some(stats) = batch.stats.get(&container.record.id) else {
                continue;
            };

            renderer.observe_container(
                &schema.values_for(container),
                stats,
                disk.containers.get(&container.record.id),
            )?;
        }

        for volume in &disk.volumes {
            renderer.observe_volume(volume)?;
        }

        let elapsed = started.elapsed();
        scrape_metrics.set_containers_discovered(discovered);
        scrape_metrics.set_stats_fetch_failures(batch.failures);
        scrape_metrics.set_duration(elapsed.as_secs_f64());

        self.logger.log_scrape(
            discovered,
            batch.stats.len(),
            batch.failures,
            elapsed.as_millis(),
        );

        Ok(Scrape {
            body: renderer.encode()?,
            discovered,
            collected: batch.stats.len(),
            failures: batch.failures,
        })
    }
}
