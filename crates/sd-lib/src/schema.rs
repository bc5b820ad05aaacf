//! Label schema shared by every per-container gauge family
//!
//! Prometheus requires every sample of a metric vector to state the same
//! label names, so the schema is the union of the base labels and every
//! extra label seen on any discovered container. It is rebuilt on every
//! scrape; containers that went away take their labels with them.

use crate::labels::{is_valid_label_name, DiscoveredContainer};
use tracing::debug;

pub const JOB: &str = "job";
pub const CONTAINER_NAME: &str = "container_name";
pub const IMAGE: &str = "image";
pub const IMAGE_ID: &str = "image_id";
pub const CONTAINER_ID: &str = "container_id";

/// Ordered, de-duplicated label names for one scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSchema {
    names: Vec<String>,
    identity_labels: bool,
}

impl LabelSchema {
    /// Base labels (`job`, `container_name`, plus `image`, `image_id`,
    /// `container_id` when `identity_labels` is set), then extra labels in
    /// order of first appearance across `containers`. Extra labels whose
    /// names Prometheus rejects (or reserves with `__`) are skipped.
    pub fn build(containers: &[DiscoveredContainer], identity_labels: bool) -> Self {
        let mut names: Vec<String> = vec![JOB.to_string(), CONTAINER_NAME.to_string()];

        if identity_labels {
            names.extend([IMAGE, IMAGE_ID, CONTAINER_ID].map(String::from));
        }

        for container in containers {
            for label in container.labels.extra.keys() {
                if !is_valid_label_name(label) {
                    debug!(
                        container_id = %container.record.id,
                        label = %label,
                        "Extra label is not a valid metric label name, left out of metrics"
                    );
                    continue;
                }
                if !names.iter().any(|name| name == label) {
                    names.push(label.clone());
                }
            }
        }

        Self {
            names,
            identity_labels,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label values of one container, one per schema name and in schema
    /// order. Extra labels the container lacks are empty strings.
    pub fn values_for(&self, container: &DiscoveredContainer) -> Vec<String> {
        let record = &container.record;

        self.names
            .iter()
            .map(|name| match name.as_str() {
                JOB => container.labels.job.clone(),
                CONTAINER_NAME => record.name.clone(),
                IMAGE if self.identity_labels => record.image.clone(),
                IMAGE_ID if self.identity_labels => record.image_id.clone(),
                CONTAINER_ID if self.identity_labels => record.id.clone(),
                other => container
                    .labels
                    .extra
                    .get(other)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect()
    }
}
