//! Derivation of point-in-time metrics from raw counters

use crate::models::{ContainerRecord, ContainerStats, CpuReading, MemoryReading, StatsSnapshot};
use chrono::{DateTime, Utc};

/// Memory in use excluding page cache.
///
/// Computed in floating point: a cache larger than usage yields a negative
/// figure rather than an underflow.
pub fn memory_usage_bytes(memory: &MemoryReading) -> f64 {
    memory.usage as f64 - memory.cache as f64
}

/// CPU usage in percent of one core, summed over cores
///
/// `(container delta / system delta) * online cpus * 100`, or `0` when the
/// system counter did not advance.
pub fn cpu_percent(current: &CpuReading, previous: &CpuReading) -> f64 {
    let cpu_delta = current.container_total as f64 - previous.container_total as f64;
    let system_delta = current.system_total as f64 - previous.system_total as f64;

    if system_delta > 0.0 {
        (cpu_delta / system_delta) * current.online_cpus as f64 * 100.0
    } else {
        0.0
    }
}

/// Seconds since the container started.
///
/// `Some(0.0)` when the container is not running, `None` when it runs but
/// its start time is unknown or unparseable.
pub fn uptime_seconds(container: &ContainerRecord, now: DateTime<Utc>) -> Option<f64> {
    if !container.is_running() {
        return Some(0.0);
    }

    let started_at = container.started_at.as_deref()?;
    let started_at = DateTime::parse_from_rfc3339(started_at).ok()?;

    let uptime = now.signed_duration_since(started_at.with_timezone(&Utc));
    Some(uptime.num_milliseconds() as f64 / 1000.0)
}

/// Reduce one snapshot to the values rendered for a container
pub fn derive(
    container: &ContainerRecord,
    snapshot: &StatsSnapshot,
    now: DateTime<Utc>,
) -> ContainerStats {
    ContainerStats {
        memory_usage_bytes: memory_usage_bytes(&snapshot.memory),
        cpu_percent: cpu_percent(&snapshot.cpu, &snapshot.precpu),
        uptime_seconds: uptime_seconds(container, now),
    }
}
