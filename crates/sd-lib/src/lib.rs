//! Library for Docker container service discovery
//!
//! This crate provides the core functionality for:
//! - Decoding `prometheus.*` container labels into scrape targets
//! - Listing containers and fetching stats from the Docker Engine
//! - Concurrent stats collection with per-container failure isolation
//! - Rendering container gauges with a per-scrape label schema
//! - Health checks and observability

pub mod collector;
pub mod discovery;
pub mod engine;
pub mod health;
pub mod inventory;
pub mod labels;
pub mod models;
pub mod observability;
pub mod render;
pub mod schema;

pub use engine::{Engine, EngineConfig, EngineError, Scrape};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use inventory::{ContainerScope, DockerInventory, InventoryError, InventorySource};
pub use models::*;
pub use observability::{ScrapeMetrics, StructuredLogger};
