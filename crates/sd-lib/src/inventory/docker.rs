//! Docker Engine inventory
//!
//! Talks to the local Docker daemon through bollard:
//! - container listing (with published ports and labels)
//! - one-shot stats per container
//! - `system df` for rootfs / writable layer / volume sizes

use super::{InventoryError, InventorySource};
use crate::labels::is_discoverable;
use crate::models::{
    ContainerRecord, CpuReading, DiskFacts, DiskUsage, MemoryReading, PortBinding, StatsSnapshot,
    VolumeUsage,
};
use async_trait::async_trait;
use bollard::container::{
    CPUStats, InspectContainerOptions, ListContainersOptions, MemoryStats, MemoryStatsStats,
    StatsOptions,
};
use bollard::models::{ContainerSummary, Port, PortTypeEnum, SystemDataUsageResponse};
use bollard::Docker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, info};

/// Upper bound on parallel `inspect` calls while listing
const INSPECT_CONCURRENCY: usize = 16;

/// Inventory backed by the Docker Engine API
#[derive(Debug, Clone)]
pub struct DockerInventory {
    docker: Docker,
}

impl DockerInventory {
    /// Connect to the local daemon (unix socket / named pipe, or `DOCKER_HOST`)
    pub fn connect(timeout: Duration) -> Result<Self, InventoryError> {
        let docker = Docker::connect_with_local_defaults()?.with_timeout(timeout);
        info!(timeout_secs = timeout.as_secs(), "Docker client initialized");

        Ok(Self { docker })
    }

    /// Fill in start times of running discoverable containers. Only
    /// `inspect` carries `StartedAt`; a failed inspect leaves it unset.
    async fn attach_start_times(&self, records: &mut [ContainerRecord]) {
        let semaphore = Arc::new(Semaphore::new(INSPECT_CONCURRENCY));
        let mut tasks = JoinSet::new();

        for (index, record) in records.iter().enumerate() {
            if !record.is_running() || !is_discoverable(record) {
                continue;
            }

            let docker = self.docker.clone();
            let semaphore = Arc::clone(&semaphore);
            let container_id = record.id.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();

                let started_at = match docker
                    .inspect_container(&container_id, None::<InspectContainerOptions>)
                    .await
                {
                    Ok(details) => details.state.and_then(|state| state.started_at),
                    Err(e) => {
                        debug!(container_id = %container_id, error = %e, "Failed to inspect container");
                        None
                    }
                };

                (index, started_at)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, started_at)) = joined {
                records[index].started_at = started_at;
            }
        }
    }
}

#[async_trait]
impl InventorySource for DockerInventory {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, InventoryError> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await?;

        let mut records: Vec<ContainerRecord> =
            summaries.into_iter().filter_map(record_from_summary).collect();

        self.attach_start_times(&mut records).await;

        debug!(count = records.len(), "Listed containers");
        Ok(records)
    }

    async fn fetch_stats(&self, container_id: &str) -> Result<StatsSnapshot, InventoryError> {
        // one_shot = false so the daemon samples twice and fills precpu_stats
        let mut stream = Box::pin(self.docker.stats(
            container_id,
            Some(StatsOptions {
                stream: false,
                one_shot: false,
            }),
        ));

        let stats = stream
            .next()
            .await
            .ok_or_else(|| InventoryError::NoStats(container_id.to_string()))??;

        Ok(StatsSnapshot {
            cpu: cpu_reading(&stats.cpu_stats),
            precpu: cpu_reading(&stats.precpu_stats),
            memory: memory_reading(&stats.memory_stats),
        })
    }

    async fn disk_usage(&self) -> Result<DiskUsage, InventoryError> {
        let report = self.docker.df().await?;
        Ok(disk_usage_from(report))
    }

    async fn ping(&self) -> Result<(), InventoryError> {
        self.docker.ping().await?;
        Ok(())
    }
}

fn disk_usage_from(report: SystemDataUsageResponse) -> DiskUsage {
    let containers = report
        .containers
        .unwrap_or_default()
        .into_iter()
        .filter_map(|summary| {
            let id = summary.id?;
            let facts = DiskFacts {
                size_root_fs: summary.size_root_fs,
                size_rw: summary.size_rw,
                mount_count: summary.mounts.map(|mounts| mounts.len()).unwrap_or(0),
            };
            Some((id, facts))
        })
        .collect();

    // The daemon reports -1 for sizes it has not computed
    let volumes = report
        .volumes
        .unwrap_or_default()
        .into_iter()
        .map(|volume| VolumeUsage {
            size: volume.usage_data.map(|usage| usage.size).unwrap_or(-1),
            name: volume.name,
        })
        .collect();

    DiskUsage {
        containers,
        volumes,
    }
}

fn record_from_summary(summary: ContainerSummary) -> Option<ContainerRecord> {
    let id = summary.id?;

    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_default();

    Some(ContainerRecord {
        id,
        name,
        status: summary.state.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        image_id: summary.image_id.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default().into_iter().collect(),
        ports: port_table(summary.ports.as_deref().unwrap_or_default()),
        started_at: None,
    })
}

/// Group published ports by `<private port>/<protocol>`, the key format
/// used by `prometheus.metrics.port` resolution
fn port_table(ports: &[Port]) -> HashMap<String, Vec<PortBinding>> {
    let mut table: HashMap<String, Vec<PortBinding>> = HashMap::new();

    for port in ports {
        let Some(public_port) = port.public_port else {
            continue;
        };

        let protocol = match port.typ {
            Some(PortTypeEnum::UDP) => "udp",
            Some(PortTypeEnum::SCTP) => "sctp",
            _ => "tcp",
        };

        table
            .entry(format!("{}/{}", port.private_port, protocol))
            .or_default()
            .push(PortBinding {
                host_ip: port.ip.clone().unwrap_or_default(),
                host_port: public_port.to_string(),
            });
    }

    table
}

fn cpu_reading(stats: &CPUStats) -> CpuReading {
    // Older daemons omit online_cpus; the per-CPU array length stands in
    let online_cpus = stats
        .online_cpus
        .filter(|count| *count > 0)
        .or_else(|| {
            stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|per_cpu| per_cpu.len() as u64)
        })
        .unwrap_or(0);

    CpuReading {
        container_total: stats.cpu_usage.total_usage,
        system_total: stats.system_cpu_usage.unwrap_or(0),
        online_cpus: online_cpus as u32,
    }
}

fn memory_reading(stats: &MemoryStats) -> MemoryReading {
    // cgroup v2 has no `cache`; inactive_file is the closest counterpart
    let cache = match &stats.stats {
        Some(MemoryStatsStats::V1(v1)) => v1.cache,
        Some(MemoryStatsStats::V2(v2)) => v2.inactive_file,
        None => 0,
    };

    MemoryReading {
        usage: stats.usage.unwrap_or(0),
        cache,
    }
}
