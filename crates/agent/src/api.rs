//! HTTP API: service discovery, container metrics and health checks

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use sd_lib::{
    render::CONTENT_TYPE, ComponentStatus, Engine, EngineError, HealthRegistry, StructuredLogger,
};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub engine: Engine,
    pub health_registry: HealthRegistry,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(engine: Engine, health_registry: HealthRegistry, logger: StructuredLogger) -> Self {
        Self {
            engine,
            health_registry,
            logger,
        }
    }

    /// Record a failed request and turn it into a 500 response
    async fn fail(&self, endpoint: &str, error: EngineError) -> Response {
        if let EngineError::Inventory(inner) = &error {
            self.health_registry.inventory_failed(inner.to_string()).await;
        }

        let message = error.to_string();
        self.logger.log_request_failure(endpoint, &message);

        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Scrape targets in `http_sd` JSON format
async fn targets(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.targets().await {
        Ok(records) => {
            state.health_registry.inventory_ok().await;
            (StatusCode::OK, Json(records)).into_response()
        }
        Err(e) => state.fail("/targets", e).await,
    }
}

/// Container gauges in Prometheus text exposition format
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.metrics().await {
        Ok(scrape) => {
            state.health_registry.inventory_ok().await;
            state
                .health_registry
                .stats_outcome(scrape.collected, scrape.failures)
                .await;

            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, CONTENT_TYPE)],
                scrape.body,
            )
                .into_response()
        }
        Err(e) => state.fail("/metrics", e).await,
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/targets", get(targets))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sd_lib::{
        ContainerRecord, CpuReading, DiscoveryRecord, DiskUsage, EngineConfig, InventoryError,
        InventorySource, MemoryReading, PortBinding, StatsSnapshot,
    };
    use std::collections::{BTreeMap, HashMap};
    use tower::ServiceExt;

    /// In-memory inventory with one labelled container
    struct FakeInventory {
        containers: Vec<ContainerRecord>,
        down: bool,
    }

    impl FakeInventory {
        fn with_web() -> Self {
            let mut labels = BTreeMap::new();
            labels.insert("prometheus.job".to_string(), "web".to_string());
            labels.insert("prometheus.metrics.port".to_string(), "9100".to_string());

            let mut ports = HashMap::new();
            ports.insert(
                "9100/tcp".to_string(),
                vec![PortBinding {
                    host_ip: "127.0.0.1".to_string(),
                    host_port: "19100".to_string(),
                }],
            );

            Self {
                containers: vec![ContainerRecord {
                    id: "c1".to_string(),
                    name: "web".to_string(),
                    status: "running".to_string(),
                    image: "web:latest".to_string(),
                    image_id: "sha256:c1".to_string(),
                    labels,
                    ports,
                    started_at: None,
                }],
                down: false,
            }
        }

        fn down() -> Self {
            Self {
                containers: Vec::new(),
                down: true,
            }
        }
    }

    #[async_trait]
    impl InventorySource for FakeInventory {
        async fn list_containers(&self) -> Result<Vec<ContainerRecord>, InventoryError> {
            if self.down {
                return Err(InventoryError::Unavailable("daemon not reachable".to_string()));
            }
            Ok(self.containers.clone())
        }

        async fn fetch_stats(&self, _container_id: &str) -> Result<StatsSnapshot, InventoryError> {
            Ok(StatsSnapshot {
                cpu: CpuReading {
                    container_total: 200,
                    system_total: 2000,
                    online_cpus: 2,
                },
                precpu: CpuReading {
                    container_total: 100,
                    system_total: 1000,
                    online_cpus: 2,
                },
                memory: MemoryReading {
                    usage: 4096,
                    cache: 1024,
                },
            })
        }

        async fn disk_usage(&self) -> Result<DiskUsage, InventoryError> {
            Ok(DiskUsage::default())
        }

        async fn ping(&self) -> Result<(), InventoryError> {
            if self.down {
                return Err(InventoryError::Unavailable("daemon not reachable".to_string()));
            }
            Ok(())
        }
    }

    fn setup_test_app(inventory: FakeInventory) -> (Router, Arc<AppState>) {
        let logger = StructuredLogger::new("test-host");
        let engine = Engine::new(
            Arc::new(inventory),
            EngineConfig {
                identity_labels: false,
                ..Default::default()
            },
            logger.clone(),
        );
        let state = Arc::new(AppState::new(engine, HealthRegistry::new(), logger));

        (create_router(Arc::clone(&state)), state)
    }

    async fn request(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_targets_endpoint() {
        let (app, state) = setup_test_app(FakeInventory::with_web());

        let response = request(app, "/targets").await;
        assert_eq!(response.status(), StatusCode::OK);

        let records: Vec<DiscoveryRecord> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].targets, vec!["127.0.0.1:19100".to_string()]);
        assert_eq!(records[0].labels["job"], "web");
        assert_eq!(records[0].labels["container_name"], "web");

        assert!(state.health_registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, state) = setup_test_app(FakeInventory::with_web());

        let response = request(app, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            CONTENT_TYPE
        );

        let text = body_text(response).await;
        assert!(text.contains(
            "docker_container_memory_usage_bytes{container_name=\"web\",job=\"web\"} 3072"
        ));
        assert!(text.contains(
            "docker_container_cpu_usage_percent{container_name=\"web\",job=\"web\"} 20"
        ));
        assert!(text.contains("docker_sd_containers_discovered 1"));

        assert_eq!(
            state.health_registry.health().await.status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_inventory_failure_returns_500() {
        let (app, state) = setup_test_app(FakeInventory::down());

        let response = request(app.clone(), "/targets").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("daemon not reachable"));

        let response = request(app.clone(), "/metrics").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = request(app, "/healthz").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!state.health_registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (app, _) = setup_test_app(FakeInventory::with_web());

        let response = request(app, "/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["components"]["inventory"].is_object());
    }

    #[tokio::test]
    async fn test_readyz_before_and_after_first_request() {
        let (app, _) = setup_test_app(FakeInventory::with_web());

        let response = request(app.clone(), "/readyz").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        request(app.clone(), "/targets").await;

        let response = request(app, "/readyz").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (app, _) = setup_test_app(FakeInventory::with_web());

        let response = request(app, "/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
