//! Scrape target discovery in Prometheus `http_sd` format

use crate::labels::DiscoveredContainer;
use crate::models::DiscoveryRecord;
use crate::schema::{CONTAINER_NAME, JOB};
use std::collections::BTreeMap;

/// Map discovered containers to target records, in inventory order.
///
/// Containers without a resolved target are skipped, unless
/// `include_unresolved` is set: then they are listed with no targets and
/// only the base labels.
pub fn discovery_records(
    containers: &[DiscoveredContainer],
    include_unresolved: bool,
) -> Vec<DiscoveryRecord> {
    containers
        .iter()
        .filter_map(|container| match &container.labels.target {
            Some(target) => {
                let mut labels = base_labels(container);
                // Extra labels may override base keys
                labels.extend(
                    container
                        .labels
                        .extra
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone())),
                );

                Some(DiscoveryRecord {
                    targets: vec![target.address.clone()],
                    labels,
                })
            }
            None if include_unresolved => Some(DiscoveryRecord {
                targets: Vec::new(),
                labels: base_labels(container),
            }),
            None => None,
        })
        .collect()
}

fn base_labels(container: &DiscoveredContainer) -> BTreeMap<String, String> {
    BTreeMap::from([
        (JOB.to_string(), container.labels.job.clone()),
        (CONTAINER_NAME.to_string(), container.record.name.clone()),
    ])
}
