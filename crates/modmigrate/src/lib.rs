//! modmigrate - runs module migrations when an application upgrades.
//!
//! The [`UpgradeHandler`] reads the version map recorded in a
//! [`StateStore`], plans the migrations the [`ModuleCatalog`] requires, runs
//! them inside one state transaction, initializes newly added modules, and
//! commits the migrated state together with the new version map.

pub mod config;
pub mod error;
pub mod genesis;
pub mod handler;

pub use config::UpgradeConfig;
pub use error::UpgradeError;
pub use genesis::{InitFn, ModuleInitializers};
pub use handler::{UpgradeHandler, UpgradeOutcome};

pub use modmigrate_core::{
    new_shared_metrics, ConsensusVersion, MigrationError, MigrationFnError, MigrationPlan,
    MigrationRegistry, MigrationRegistryBuilder, MigrationStep, ModuleCatalog, ModuleDef,
    OrderingPolicy, SharedMigrationMetrics, StateStore, StateTransaction, StoreConfig, VersionMap,
};
