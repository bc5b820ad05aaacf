//! Gauge rendering into a request-scoped Prometheus registry
//!
//! Every scrape builds a fresh [`Registry`], fills the container gauges and
//! encodes it with the text exposition format. Nothing outlives the
//! request, so label combinations of removed containers never linger.

use crate::models::{ContainerStats, DiskFacts, VolumeUsage};
use crate::schema::LabelSchema;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

pub const MEMORY_USAGE_BYTES: &str = "docker_container_memory_usage_bytes";
pub const CPU_USAGE_PERCENT: &str = "docker_container_cpu_usage_percent";
pub const UPTIME_SECONDS: &str = "docker_container_uptime_seconds";
pub const ROOTFS_SIZE_BYTES: &str = "docker_container_rootfs_size_bytes";
pub const DISK_SIZE_BYTES: &str = "docker_container_disk_size_bytes";
pub const MOUNT_COUNT: &str = "docker_container_mount_count";
pub const VOLUME_SIZE_BYTES: &str = "docker_volume_size_bytes";

/// Label of the volume gauge, which sits outside the container schema
pub const VOLUME_ID: &str = "volume_id";

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Gauge families of one scrape
pub struct MetricRenderer {
    registry: Registry,
    memory_usage: GaugeVec,
    cpu_usage: GaugeVec,
    uptime: GaugeVec,
    rootfs_size: GaugeVec,
    disk_size: GaugeVec,
    mount_count: GaugeVec,
    volume_size: GaugeVec,
}

impl MetricRenderer {
    /// Register all gauge families in a new registry, the per-container
    /// ones with exactly the names of `schema`
    pub fn new(schema: &LabelSchema) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let label_names: Vec<&str> = schema.names().iter().map(String::as_str).collect();

        let gauge = |name: &str, help: &str, labels: &[&str]| -> Result<GaugeVec, prometheus::Error> {
            let vec = GaugeVec::new(Opts::new(name, help), labels)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        let memory_usage = gauge(
            MEMORY_USAGE_BYTES,
            "Container memory usage (without caches)",
            &label_names,
        )?;
        let cpu_usage = gauge(
            CPU_USAGE_PERCENT,
            "Container CPU usage percent (not divided by number of CPU cores)",
            &label_names,
        )?;
        let uptime = gauge(UPTIME_SECONDS, "Container uptime", &label_names)?;
        let rootfs_size = gauge(
            ROOTFS_SIZE_BYTES,
            "Container rootfs size in bytes",
            &label_names,
        )?;
        let disk_size = gauge(
            DISK_SIZE_BYTES,
            "Container size on disk in bytes",
            &label_names,
        )?;
        let mount_count = gauge(MOUNT_COUNT, "Number of container mounts", &label_names)?;
        let volume_size = gauge(VOLUME_SIZE_BYTES, "Size of a volume in bytes.", &[VOLUME_ID])?;

        Ok(Self {
            registry,
            memory_usage,
            cpu_usage,
            uptime,
            rootfs_size,
            disk_size,
            mount_count,
            volume_size,
        })
    }

    /// The scrape's registry, for registering additional collectors
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one container's samples. `label_values` must follow the
    /// schema the renderer was built with.
    pub fn observe_container(
        &self,
        label_values: &[String],
        stats: &ContainerStats,
        disk: Option<&DiskFacts>,
    ) -> Result<(), prometheus::Error> {
        let values: Vec<&str> = label_values.iter().map(String::as_str).collect();

        self.memory_usage
            .get_metric_with_label_values(&values)?
            .set(stats.memory_usage_bytes);
        self.cpu_usage
            .get_metric_with_label_values(&values)?
            .set(stats.cpu_percent);

        if let Some(uptime) = stats.uptime_seconds {
            self.uptime.get_metric_with_label_values(&values)?.set(uptime);
        }

        if let Some(disk) = disk {
            if let Some(size) = disk.size_root_fs {
                self.rootfs_size
                    .get_metric_with_label_values(&values)?
                    .set(size as f64);
            }
            if let Some(size) = disk.size_rw {
                self.disk_size
                    .get_metric_with_label_values(&values)?
                    .set(size as f64);
            }
            self.mount_count
                .get_metric_with_label_values(&values)?
                .set(disk.mount_count as f64);
        }

        Ok(())
    }

    pub fn observe_volume(&self, volume: &VolumeUsage) -> Result<(), prometheus::Error> {
        self.volume_size
            .get_metric_with_label_values(&[volume.name.as_str()])?
            .set(volume.size as f64);
        Ok(())
    }

    /// Encode every registered family in the text exposition format
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
