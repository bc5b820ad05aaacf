//! In-memory inventory for tests

use super::{InventoryError, InventorySource};
use crate::models::{ContainerRecord, DiskUsage, PortBinding, StatsSnapshot};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct MockInventory {
    pub containers: Vec<ContainerRecord>,
    pub stats: HashMap<String, StatsSnapshot>,
    pub disk: DiskUsage,
    /// Containers whose stats fetch fails
    pub failing: HashSet<String>,
    /// Containers whose stats fetch never returns in time
    pub stalled: HashSet<String>,
    pub list_fails: bool,
    pub stats_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MockInventory {
    pub fn new(containers: Vec<ContainerRecord>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn with_stats(mut self, container_id: &str, snapshot: StatsSnapshot) -> Self {
        self.stats.insert(container_id.to_string(), snapshot);
        self
    }

    pub fn failing(mut self, container_id: &str) -> Self {
        self.failing.insert(container_id.to_string());
        self
    }

    pub fn stalled(mut self, container_id: &str) -> Self {
        self.stalled.insert(container_id.to_string());
        self
    }
}

#[async_trait]
impl InventorySource for MockInventory {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, InventoryError> {
        if self.list_fails {
            return Err(InventoryError::Unavailable("daemon unreachable".to_string()));
        }
        Ok(self.containers.clone())
    }

    async fn fetch_stats(&self, container_id: &str) -> Result<StatsSnapshot, InventoryError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        // Yield so concurrent fetches overlap
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.stalled.contains(container_id) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(container_id) {
            return Err(InventoryError::Unavailable(format!(
                "no such container: {}",
                container_id
            )));
        }

        Ok(self.stats.get(container_id).copied().unwrap_or_default())
    }

    async fn disk_usage(&self) -> Result<DiskUsage, InventoryError> {
        Ok(self.disk.clone())
    }

    async fn ping(&self) -> Result<(), InventoryError> {
        Ok(())
    }
}

/// Build a container record from `(key, value)` label pairs
pub(crate) fn container(id: &str, name: &str, labels: &[(&str, &str)]) -> ContainerRecord {
    ContainerRecord {
        id: id.to_string(),
        name: name.to_string(),
        status: "running".to_string(),
        image: format!("{}:latest", name),
        image_id: format!("sha256:{}", id),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ports: HashMap::new(),
        started_at: None,
    }
}

pub(crate) fn publish(
    mut container: ContainerRecord,
    spec: &str,
    host_ip: &str,
    host_port: &str,
) -> ContainerRecord {
    container
        .ports
        .entry(spec.to_string())
        .or_default()
        .push(PortBinding {
            host_ip: host_ip.to_string(),
            host_port: host_port.to_string(),
        });
    container
}
