//! Muninn - client-side resiliency and observability for record APIs
//!
//! This crate provides the layer between a data-entry UI and a
//! record-management HTTP service:
//!
//! - [`ResponseCache`] — TTL cache for fetched pages with batched
//!   invalidation.
//! - [`Debouncer`] — collapses bursts of calls to an async operation into a
//!   single execution.
//! - [`MetricsLog`] — bounded, persisted log of operation timings with
//!   aggregate queries.
//! - [`ApiClient`] — CRUD client wiring the three together.
//!
//! Every component is an explicit instance; nothing is process-global.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use muninn::{
//!     ApiClient, CacheConfig, FileStore, ListQuery, MetricsConfig, MetricsLog, ResponseCache,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Identification {
//!     id: u64,
//!     nat_op: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let metrics = MetricsLog::open(MetricsConfig::default(), Arc::new(FileStore::default())).await;
//!     let client = ApiClient::<Identification>::builder()
//!         .base_url("http://localhost:8080")
//!         .cache(ResponseCache::new(CacheConfig::default()))
//!         .metrics(metrics)
//!         .build()?;
//!
//!     let page = client.list(&ListQuery::new().page_size(20)).await?;
//!     println!("{} of {} records", page.data.len(), page.total_count);
//!
//!     println!("{:?}", client.metrics().operation_counts());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod metrics_log;
pub mod telemetry;
pub mod timer;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, ResponseCache};
pub use client::{ApiClient, ApiClientBuilder, ClientConfig, ListQuery, Page, SortOrder};
pub use config::Config;
pub use debounce::Debouncer;
pub use error::{MuninnError, Result};
pub use metrics_log::{
    FileStore, LoadOutcome, MemoryStore, MetricsConfig, MetricsLog, MetricsPage, MetricsStore,
    OperationMetric,
};
pub use timer::ScheduledTask;
