//! Observability for the discovery agent
//!
//! Provides:
//! - Request-scoped self metrics (scrape duration, containers, stats failures)
//! - Structured JSON logging with tracing

use prometheus::{Gauge, IntGauge, Opts, Registry};
use tracing::{info, warn};

/// Self metrics of one scrape, registered next to the container gauges
pub struct ScrapeMetrics {
    duration_seconds: Gauge,
    containers_discovered: IntGauge,
    stats_fetch_failures: IntGauge,
}

impl ScrapeMetrics {
    /// Create the gauges and register them in the scrape's registry
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let duration_seconds = Gauge::with_opts(Opts::new(
            "docker_sd_scrape_duration_seconds",
            "Time spent assembling this scrape",
        ))?;
        let containers_discovered = IntGauge::with_opts(Opts::new(
            "docker_sd_containers_discovered",
            "Containers carrying the job label in this scrape",
        ))?;
        let stats_fetch_failures = IntGauge::with_opts(Opts::new(
            "docker_sd_stats_fetch_failures",
            "Stats fetches that failed or timed out in this scrape",
        ))?;

        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(containers_discovered.clone()))?;
        registry.register(Box::new(stats_fetch_failures.clone()))?;

        Ok(Self {
            duration_seconds,
            containers_discovered,
            stats_fetch_failures,
        })
    }

    pub fn set_duration(&self, seconds: f64) {
        self.duration_seconds.set(seconds);
    }

    pub fn set_containers_discovered(&self, count: usize) {
        self.containers_discovered.set(count as i64);
    }

    pub fn set_stats_fetch_failures(&self, count: usize) {
        self.stats_fetch_failures.set(count as i64);
    }
}

/// Structured logger for agent events
///
/// Emits named events with consistent fields so log pipelines can key on
/// `event`.
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, listen_addr: &str) {
        info!(
            event = "agent_started",
            host = %self.host,
            agent_version = %version,
            listen_addr = %listen_addr,
            "Docker discovery agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            host = %self.host,
            reason = %reason,
            "Docker discovery agent shutting down"
        );
    }

    /// Log a finished metrics scrape
    pub fn log_scrape(&self, containers: usize, collected: usize, failures: usize, elapsed_ms: u128) {
        if failures > 0 {
            warn!(
                event = "scrape_completed",
                host = %self.host,
                containers = containers,
                collected = collected,
                failures = failures,
                elapsed_ms = elapsed_ms,
                "Metrics scrape completed with stats failures"
            );
        } else {
            info!(
                event = "scrape_completed",
                host = %self.host,
                containers = containers,
                collected = collected,
                elapsed_ms = elapsed_ms,
                "Metrics scrape completed"
            );
        }
    }

    /// Log an error that aborted a request
    pub fn log_request_failure(&self, endpoint: &str, error: &str) {
        warn!(
            event = "request_failed",
            host = %self.host,
            endpoint = %endpoint,
            error = %error,
            "Request failed"
        );
    }
}
