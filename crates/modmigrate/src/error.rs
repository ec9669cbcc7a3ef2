//! Upgrade error types.

use modmigrate_core::{ConsensusVersion, MigrationError, MigrationFnError};
use thiserror::Error;

/// Errors that abort an upgrade.
///
/// None of these leave partial state behind: the upgrade transaction is
/// discarded before the error is returned. The application should halt.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// Planning or executing migrations failed.
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Reading or committing the state store failed.
    #[error("storage error: {0}")]
    Storage(#[from] modmigrate_core::Error),

    /// A new module's initializer failed.
    #[error("initializing module {module} failed: {source}")]
    Initialization {
        /// Module being initialized.
        module: String,
        /// Error returned by the initializer.
        #[source]
        source: MigrationFnError,
    },

    /// After migration a catalog module does not record its current version.
    #[error("module {module} records {recorded:?} after upgrade, expected v{expected}")]
    VersionMismatch {
        /// The module.
        module: String,
        /// Version the catalog declares.
        expected: ConsensusVersion,
        /// Version the new map records, if any.
        recorded: Option<ConsensusVersion>,
    },

    /// Two initializers were registered for one module.
    #[error("duplicate initializer for module {module}")]
    DuplicateInitializer {
        /// The module.
        module: String,
    },
}

impl UpgradeError {
    /// The module this error concerns, if it names one.
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::Migration(MigrationError::MigrationFailed { module, .. })
            | Self::Migration(MigrationError::VersionRegression { module, .. })
            | Self::Migration(MigrationError::MigrationNotFound { module, .. })
            | Self::Migration(MigrationError::InvalidVersion { module, .. })
            | Self::Initialization { module, .. }
            | Self::VersionMismatch { module, .. }
            | Self::DuplicateInitializer { module } => Some(module),
            _ => None,
        }
    }
}
