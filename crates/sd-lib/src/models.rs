//! Core data models for the discovery agent

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Container lifecycle status as reported by the engine
pub const STATUS_RUNNING: &str = "running";

/// A single host binding of a declared container port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Container as seen by one inventory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    /// Container name without the leading `/`
    pub name: String,
    pub status: String,
    pub image: String,
    pub image_id: String,
    /// Labels ordered by key so every walk over them is deterministic
    pub labels: BTreeMap<String, String>,
    /// Declared port spec (e.g. `9100/tcp`) -> host bindings
    pub ports: HashMap<String, Vec<PortBinding>>,
    /// RFC 3339 start timestamp, present once the container has started
    pub started_at: Option<String>,
}

impl ContainerRecord {
    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }
}

/// Disk facts for one container from the engine's disk-usage report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskFacts {
    pub size_root_fs: Option<i64>,
    pub size_rw: Option<i64>,
    pub mount_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeUsage {
    pub name: String,
    pub size: i64,
}

/// Disk-usage report for the whole host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUsage {
    /// container id -> disk facts
    pub containers: HashMap<String, DiskFacts>,
    pub volumes: Vec<VolumeUsage>,
}

/// One CPU counter reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuReading {
    /// Cumulative CPU time consumed by the container
    pub container_total: u64,
    /// Cumulative CPU time of the whole host
    pub system_total: u64,
    pub online_cpus: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub usage: u64,
    pub cache: u64,
}

/// Paired current/previous counters returned by a single stats call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cpu: CpuReading,
    pub precpu: CpuReading,
    pub memory: MemoryReading,
}

/// Values derived from a [`StatsSnapshot`] for one container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub memory_usage_bytes: f64,
    pub cpu_percent: f64,
    /// `None` for a running container whose start time is unknown
    pub uptime_seconds: Option<f64>,
}

/// A scrape target entry in Prometheus `http_sd` format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}
