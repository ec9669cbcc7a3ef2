//! Migration engine.
//!
//! Transitions persisted module state from one release to the next:
//! - [`MigrationRegistry`]: one function per `(module, from_version)`
//! - [`Planner`]: diffs recorded versions against the catalog into a plan
//! - [`Executor`]: runs the plan against a single state transaction
//!
//! Planning is total before any state is touched. Execution is all or
//! nothing: the first failing step aborts the run and the caller discards
//! the transaction.
//!
//! # Example
//!
//! ```ignore
//! use modmigrate_core::migration::{Executor, MigrationRegistry, Planner};
//!
//! let mut builder = MigrationRegistry::builder();
//! builder.register("bank", 1, migrate_bank_v1_to_v2)?;
//! let registry = builder.build();
//!
//! let plan = Planner::new(&registry).plan(&recorded, &catalog)?;
//! let mut tx = store.transaction();
//! let result = Executor::new(&registry).run(&plan, &mut tx)?;
//! tx.stage_version_map(&result.version_map);
//! tx.commit()?;
//! ```

pub mod error;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod registry;

pub use error::{MigrationError, MigrationFnError};
pub use executor::{Executor, MigrationResult};
pub use plan::{MigrationPlan, MigrationStep};
pub use planner::{OrderingPolicy, Planner};
pub use registry::{MigrationFn, MigrationRegistry, MigrationRegistryBuilder, RegistryId};
