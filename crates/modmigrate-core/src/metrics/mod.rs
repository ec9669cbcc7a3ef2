//! Migration metrics.
//!
//! Counters for upgrade runs and their steps, a step latency histogram, and
//! Prometheus text export.
//!
//! ```ignore
//! use modmigrate_core::metrics::new_shared_metrics;
//!
//! let metrics = new_shared_metrics();
//! let executor = Executor::new(&registry).with_metrics(metrics.clone());
//! // ... run an upgrade ...
//! println!("{}", metrics.to_prometheus());
//! ```

mod histogram;
mod registry;

pub use histogram::Histogram;
pub use registry::{new_shared_metrics, MigrationMetrics, SharedMigrationMetrics};
