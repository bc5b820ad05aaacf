//! Container label codec
//!
//! Containers opt in to discovery with labels under the `prometheus.`
//! prefix:
//! - `prometheus.job` marks the container as discoverable
//! - `prometheus.labels.<name>` adds the extra label `<name>`
//! - `prometheus.metrics.port` / `prometheus.metrics.host` give the scrape
//!   target, resolved through the container's published ports
//! - `prometheus.address` gives a ready `host:port` target
//!
//! Parsing never fails. Anything missing or malformed degrades to "no
//! target" or "no extra label".

use crate::models::ContainerRecord;
use std::collections::BTreeMap;
use tracing::debug;

pub const JOB_LABEL: &str = "prometheus.job";
pub const TARGET_LABELS_PREFIX: &str = "prometheus.labels.";
pub const TARGET_PORT_LABEL: &str = "prometheus.metrics.port";
pub const TARGET_HOST_LABEL: &str = "prometheus.metrics.host";
pub const TARGET_ADDRESS_LABEL: &str = "prometheus.address";

/// Where a resolved target address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// `prometheus.address`
    Address,
    /// `prometheus.metrics.port` matched a published container port
    PortMapping,
    /// Raw `prometheus.metrics.host` / `prometheus.metrics.port` values
    Labels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub address: String,
    pub source: TargetSource,
}

/// Decoded discovery labels of one discoverable container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLabels {
    pub job: String,
    pub target: Option<ResolvedTarget>,
    /// Extra labels with the prefix stripped, ordered by name
    pub extra: BTreeMap<String, String>,
}

impl TargetLabels {
    /// Decode a container's labels. Returns `None` when the container does
    /// not carry the job label.
    pub fn parse(container: &ContainerRecord) -> Option<Self> {
        let job = container.labels.get(JOB_LABEL)?;
        let target = resolve_target(container);

        match &target {
            Some(target) => debug!(
                container_id = %container.id,
                job = %job,
                address = %target.address,
                source = ?target.source,
                "Resolved scrape target"
            ),
            None => debug!(container_id = %container.id, job = %job, "No scrape target"),
        }

        Some(Self {
            job: job.clone(),
            target,
            extra: extra_labels(&container.labels),
        })
    }
}

/// A container that carries the job label, with its decoded labels
#[derive(Debug, Clone)]
pub struct DiscoveredContainer {
    pub record: ContainerRecord,
    pub labels: TargetLabels,
}

/// Keep the containers that opted in to discovery, in inventory order
pub fn discover(containers: Vec<ContainerRecord>) -> Vec<DiscoveredContainer> {
    containers
        .into_iter()
        .filter_map(|record| {
            let labels = TargetLabels::parse(&record)?;
            Some(DiscoveredContainer { record, labels })
        })
        .collect()
}

/// Whether the container opted in to discovery
pub fn is_discoverable(container: &ContainerRecord) -> bool {
    container.labels.contains_key(JOB_LABEL)
}

/// Collect `prometheus.labels.<name>` entries as `<name>` -> value.
///
/// Names are kept as written, reserved ones such as `__metrics_path__`
/// included, so discovery records can pass them on. The metric schema
/// applies [`is_valid_label_name`] on its own.
pub fn extra_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter_map(|(label_name, label_value)| {
            let name = label_name.strip_prefix(TARGET_LABELS_PREFIX)?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), label_value.clone()))
        })
        .collect()
}

/// Resolve the scrape target address of a container.
///
/// `prometheus.address` wins when set. Otherwise the metrics port is
/// looked up in the published ports (`<port>/tcp` unless the label already
/// names a protocol); the first binding supplies the host port, and the
/// host IP unless `prometheus.metrics.host` is set. Without a binding the
/// raw label values are used. Returns `None` when host or port is missing.
pub fn resolve_target(container: &ContainerRecord) -> Option<ResolvedTarget> {
    if let Some(address) = non_empty_label(container, TARGET_ADDRESS_LABEL) {
        return Some(ResolvedTarget {
            address: address.to_string(),
            source: TargetSource::Address,
        });
    }

    let port_label = non_empty_label(container, TARGET_PORT_LABEL)?;
    let host_label = non_empty_label(container, TARGET_HOST_LABEL);

    let (port_number, port_spec) = match port_label.split_once('/') {
        Some((number, _)) => (number, port_label.to_string()),
        None => (port_label, format!("{}/tcp", port_label)),
    };

    let binding = container
        .ports
        .get(&port_spec)
        .and_then(|bindings| bindings.first());

    let (host, port, source) = match binding {
        Some(binding) => (
            host_label.unwrap_or(binding.host_ip.as_str()),
            binding.host_port.as_str(),
            TargetSource::PortMapping,
        ),
        None => (host_label?, port_number, TargetSource::Labels),
    };

    if host.is_empty() || port.is_empty() {
        return None;
    }

    Some(ResolvedTarget {
        address: format!("{}:{}", host, port),
        source,
    })
}

fn non_empty_label<'a>(container: &'a ContainerRecord, key: &str) -> Option<&'a str> {
    container
        .labels
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Prometheus label name rule: `[a-zA-Z_][a-zA-Z0-9_]*`, and names
/// starting with `__` are reserved.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();

    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');

    first_ok
        && !name.starts_with("__")
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
