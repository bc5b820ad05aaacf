//! Health tracking for the discovery agent
//!
//! The agent has two moving parts worth reporting on `/healthz`: the
//! container inventory (the Docker daemon) and the per-container stats
//! fetches. Readiness flips on once the inventory has answered.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working, but some requests lost data
    Degraded,
    Unhealthy,
}

/// Component names for health tracking
pub mod components {
    pub const INVENTORY: &str = "inventory";
    pub const STATS: &str = "stats";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct HealthState {
    components: HashMap<String, ComponentHealth>,
    ready: bool,
}

/// Shared health state, cheap to clone into request handlers
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    /// Registry with both components healthy and readiness off
    pub fn new() -> Self {
        let mut state = HealthState::default();
        for name in [components::INVENTORY, components::STATS] {
            state.components.insert(
                name.to_string(),
                ComponentHealth::new(ComponentStatus::Healthy, None),
            );
        }

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        let mut state = self.state.write().await;
        state
            .components
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }

    /// Record a successful inventory call; the first one makes the agent ready
    pub async fn inventory_ok(&self) {
        self.set(components::INVENTORY, ComponentStatus::Healthy, None)
            .await;
        self.state.write().await.ready = true;
    }

    /// Record a failed inventory call
    pub async fn inventory_failed(&self, message: impl Into<String>) {
        self.set(
            components::INVENTORY,
            ComponentStatus::Unhealthy,
            Some(message.into()),
        )
        .await;
    }

    /// Record the stats outcome of one scrape
    pub async fn stats_outcome(&self, collected: usize, failures: usize) {
        if failures == 0 {
            self.set(components::STATS, ComponentStatus::Healthy, None)
                .await;
        } else {
            let message = format!("{} of {} stats fetches failed", failures, collected + failures);
            self.set(components::STATS, ComponentStatus::Degraded, Some(message))
                .await;
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();

        let status = components
            .values()
            .map(|health| health.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            });

        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let inventory_down = state
            .components
            .get(components::INVENTORY)
            .map(|health| health.status == ComponentStatus::Unhealthy)
            .unwrap_or(false);

        let reason = if !state.ready {
            Some("Container inventory has not answered yet".to_string())
        } else if inventory_down {
            Some("Container inventory unavailable".to_string())
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
