//! Collection tests against an in-memory inventory
//!
//! These exercise the fan-out without a container engine: partial
//! failures, timeouts and the concurrency ceiling.

#[cfg(test)]
mod batch_tests {
    use crate::collector::{CollectorConfig, StatsCollector};
    use crate::inventory::mock::{container, MockInventory};
    use crate::labels::discover;
    use crate::models::{CpuReading, MemoryReading, StatsSnapshot};
    use chrono::Utc;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn snapshot(usage: u64, cache: u64) -> StatsSnapshot {
        StatsSnapshot {
            cpu: CpuReading {
                container_total: 150,
                system_total: 10150,
                online_cpus: 4,
            },
            precpu: CpuReading {
                container_total: 100,
                system_total: 10000,
                online_cpus: 4,
            },
            memory: MemoryReading { usage, cache },
        }
    }

    fn labeled(id: &str) -> crate::models::ContainerRecord {
        container(id, id, &[("prometheus.job", "web")])
    }

    #[tokio::test]
    async fn test_collect_all_containers() {
        let inventory = MockInventory::new(vec![labeled("a"), labeled("b")])
            .with_stats("a", snapshot(500, 120))
            .with_stats("b", snapshot(1000, 0));
        let containers = discover(inventory.containers.clone());
        let source = Arc::new(inventory);

        let collector = StatsCollector::new(source.clone(), CollectorConfig::default());
        let batch = collector.collect(&containers, Utc::now()).await;

        assert_eq!(batch.failures, 0);
        assert_eq!(batch.stats.len(), 2);
        assert_eq!(batch.stats["a"].memory_usage_bytes, 380.0);
        assert_eq!(batch.stats["b"].memory_usage_bytes, 1000.0);
        assert!((batch.stats["a"].cpu_percent - 133.333).abs() < 0.001);
        assert_eq!(source.stats_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_abort_batch() {
        let inventory = MockInventory::new(vec![labeled("a"), labeled("gone"), labeled("c")])
            .with_stats("a", snapshot(500, 120))
            .with_stats("c", snapshot(700, 100))
            .failing("gone");
        let containers = discover(inventory.containers.clone());

        let collector = StatsCollector::new(Arc::new(inventory), CollectorConfig::default());
        let batch = collector.collect(&containers, Utc::now()).await;

        assert_eq!(batch.failures, 1);
        assert_eq!(batch.stats.len(), 2);
        assert!(batch.stats.contains_key("a"));
        assert!(batch.stats.contains_key("c"));
        assert!(!batch.stats.contains_key("gone"));
    }

    #[tokio::test]
    async fn test_timed_out_fetch_counts_as_failure() {
        let inventory = MockInventory::new(vec![labeled("a"), labeled("slow")])
            .with_stats("a", snapshot(500, 120))
            .stalled("slow");
        let containers = discover(inventory.containers.clone());

        let config = CollectorConfig {
            concurrency: 4,
            fetch_timeout: Duration::from_millis(100),
        };
        let collector = StatsCollector::new(Arc::new(inventory), config);
        let batch = collector.collect(&containers, Utc::now()).await;

        assert_eq!(batch.failures, 1);
        assert_eq!(batch.stats.len(), 1);
        assert!(batch.stats.contains_key("a"));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let ids: Vec<String> = (0..12).map(|i| format!("c{}", i)).collect();
        let inventory = MockInventory::new(ids.iter().map(|id| labeled(id)).collect());
        let containers = discover(inventory.containers.clone());
        let source = Arc::new(inventory);

        let config = CollectorConfig {
            concurrency: 3,
            fetch_timeout: Duration::from_secs(5),
        };
        let collector = StatsCollector::new(source.clone(), config);
        let batch = collector.collect(&containers, Utc::now()).await;

        assert_eq!(batch.stats.len(), 12);
        assert_eq!(source.stats_calls.load(Ordering::SeqCst), 12);

        let peak = source.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= 3, "peak in-flight fetches was {}", peak);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_collects() {
        let inventory = MockInventory::new(vec![labeled("a")]).with_stats("a", snapshot(10, 0));
        let containers = discover(inventory.containers.clone());

        let config = CollectorConfig {
            concurrency: 0,
            fetch_timeout: Duration::from_secs(5),
        };
        let collector = StatsCollector::new(Arc::new(inventory), config);
        let batch = collector.collect(&containers, Utc::now()).await;

        assert_eq!(batch.stats.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_inventory() {
        let collector = StatsCollector::new(
            Arc::new(MockInventory::new(Vec::new())),
            CollectorConfig::default(),
        );

        let batch = collector.collect(&[], Utc::now()).await;

        assert!(batch.stats.is_empty());
        assert_eq!(batch.failures, 0);
    }
}
