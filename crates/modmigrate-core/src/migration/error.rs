//! Migration-specific error types.

use crate::version::ConsensusVersion;
use thiserror::Error;

/// Error returned by a migration function.
///
/// The executor never inspects or rewrites it; it is carried verbatim as the
/// source of [`MigrationError::MigrationFailed`].
pub type MigrationFnError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Migration-specific errors.
///
/// Every variant aborts the whole upgrade attempt.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration is already registered for this module and source version.
    #[error("duplicate migration for {module} from version {from_version}")]
    DuplicateMigration {
        /// The module name.
        module: String,
        /// The source version of the duplicate migration.
        from_version: ConsensusVersion,
    },

    /// The recorded version is newer than the compiled module.
    #[error("version regression for {module}: recorded v{recorded}, compiled v{target}")]
    VersionRegression {
        /// The module name.
        module: String,
        /// Version recorded in the version map.
        recorded: ConsensusVersion,
        /// Version of the compiled module.
        target: ConsensusVersion,
    },

    /// No migration is registered for a required transition.
    #[error("no migration registered for {module} from version {from_version}")]
    MigrationNotFound {
        /// The module name.
        module: String,
        /// The source version that has no migration.
        from_version: ConsensusVersion,
    },

    /// The ordering hints contain a cycle.
    #[error("ordering hints contain a cycle, modules that could not be ordered: {modules:?}")]
    OrderingCycle {
        /// Modules that could not be ordered, sorted by name. Includes the
        /// cycle members and every module hinted after one of them.
        modules: Vec<String>,
    },

    /// A migration function reported failure.
    #[error("migration {module} v{from_version} -> v{to_version} failed at step {step_index}: {source}")]
    MigrationFailed {
        /// Position of the failing step in the plan.
        step_index: usize,
        /// The module name.
        module: String,
        /// Source version of the failing step.
        from_version: ConsensusVersion,
        /// Target version of the failing step.
        to_version: ConsensusVersion,
        /// The error returned by the migration function.
        #[source]
        source: MigrationFnError,
    },

    /// The registry no longer matches the plan being executed.
    #[error("migration registry changed since planning: {message}")]
    RegistryChanged {
        /// Description of the mismatch.
        message: String,
    },

    /// A version of zero was supplied.
    #[error("invalid version {version} for {module}: versions start at 1")]
    InvalidVersion {
        /// The module name.
        module: String,
        /// The rejected version.
        version: ConsensusVersion,
    },

    /// A module was registered twice in the catalog.
    #[error("module {module} is already registered in the catalog")]
    DuplicateModule {
        /// The module name.
        module: String,
    },

    /// An explicit migration order does not match the catalog.
    #[error("invalid migration order: {message}")]
    InvalidOrder {
        /// Description of the problem.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),
}

impl MigrationError {
    /// Check whether this error was raised before any state was touched.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            MigrationError::VersionRegression { .. }
                | MigrationError::MigrationNotFound { .. }
                | MigrationError::OrderingCycle { .. }
                | MigrationError::InvalidVersion { .. }
                | MigrationError::InvalidOrder { .. }
        )
    }

    /// The `(module, from_version, to_version)` of a failed step, if any.
    pub fn failed_step(&self) -> Option<(&str, ConsensusVersion, ConsensusVersion)> {
        match self {
            MigrationError::MigrationFailed {
                module,
                from_version,
                to_version,
                ..
            } => Some((module.as_str(), *from_version, *to_version)),
            _ => None,
        }
    }
}
