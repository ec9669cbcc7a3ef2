//! modmigrate core - version maps, module catalog, and the migration engine.
//!
//! This crate plans and executes per-module state migrations when an
//! application composed of independently versioned modules upgrades.

pub mod catalog;
pub mod error;
pub mod metrics;
pub mod migration;
pub mod storage;
pub mod version;

pub use catalog::{ModuleCatalog, ModuleDef};
pub use error::Error;
pub use migration::{
    Executor, MigrationError, MigrationFn, MigrationFnError, MigrationPlan, MigrationRegistry,
    MigrationRegistryBuilder, MigrationResult, MigrationStep, OrderingPolicy, Planner, RegistryId,
};
pub use storage::{StateStore, StateTransaction, StoreConfig};
pub use version::{ConsensusVersion, ModuleVersion, VersionMap};

// Metrics exports
pub use metrics::{new_shared_metrics, MigrationMetrics, SharedMigrationMetrics};
