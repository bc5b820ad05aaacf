//! Agent configuration

use anyhow::{Context, Result};
use sd_lib::collector::CollectorConfig;
use sd_lib::{ContainerScope, EngineConfig};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional configuration file
const CONFIG_FILE_ENV: &str = "DOCKER_SD_CONFIG";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Host name reported in structured logs
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port for `/targets`, `/metrics` and health endpoints
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// `all` or `running`
    #[serde(default)]
    pub container_scope: ContainerScope,

    /// Maximum parallel stats fetches per scrape
    #[serde(default = "default_stats_concurrency")]
    pub stats_concurrency: usize,

    /// Per-container stats fetch timeout in seconds
    #[serde(default = "default_stats_timeout")]
    pub stats_timeout_secs: u64,

    /// Add image, image id and container id labels to container gauges
    #[serde(default = "default_identity_labels")]
    pub identity_labels: bool,

    /// Only report metrics for containers with a resolvable scrape target
    #[serde(default)]
    pub metrics_require_target: bool,

    /// List discoverable containers without a scrape target on `/targets`
    #[serde(default)]
    pub include_unresolved_targets: bool,

    /// Docker API client timeout in seconds
    #[serde(default = "default_docker_timeout")]
    pub docker_timeout_secs: u64,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

fn default_stats_concurrency() -> usize {
    64
}

fn default_stats_timeout() -> u64 {
    10
}

fn default_identity_labels() -> bool {
    true
}

fn default_docker_timeout() -> u64 {
    120
}

impl AgentConfig {
    /// Load configuration from an optional file and `DOCKER_SD_*`
    /// environment variables; the environment wins
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let source = builder
            .add_source(config::Environment::with_prefix("DOCKER_SD").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::from_source(source)
    }

    fn from_source(source: config::Config) -> Result<Self> {
        source
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// `addr:port` for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            scope: self.container_scope,
            identity_labels: self.identity_labels,
            metrics_require_target: self.metrics_require_target,
            include_unresolved_targets: self.include_unresolved_targets,
            collector: CollectorConfig {
                concurrency: self.stats_concurrency,
                fetch_timeout: Duration::from_secs(self.stats_timeout_secs),
            },
        }
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout_secs)
    }
}
