//! Registry of per-module migration functions.
//!
//! Modules register one function per consecutive version transition while
//! the application boots. The builder is then frozen into an immutable
//! [`MigrationRegistry`] that planning and execution only read.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{MigrationError, MigrationFnError};
use crate::version::ConsensusVersion;

/// A migration from `from_version` to `from_version + 1` of one module.
pub type MigrationFn<S> = Box<dyn Fn(&mut S) -> Result<(), MigrationFnError> + Send + Sync>;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a built registry.
///
/// Plans remember the registry they were validated against so the executor
/// can refuse to run them against another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        Self(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry#{}", self.0)
    }
}

type MigrationTable<S> = HashMap<String, BTreeMap<ConsensusVersion, MigrationFn<S>>>;

/// Collects migrations during application bootstrap.
pub struct MigrationRegistryBuilder<S> {
    migrations: MigrationTable<S>,
}

impl<S> MigrationRegistryBuilder<S> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            migrations: HashMap::new(),
        }
    }

    /// Register the migration of `module` from `from_version` to `from_version + 1`.
    ///
    /// Fails with [`MigrationError::DuplicateMigration`] if that transition
    /// already has a migration.
    pub fn register<F>(
        &mut self,
        module: impl Into<String>,
        from_version: ConsensusVersion,
        migration: F,
    ) -> Result<&mut Self, MigrationError>
    where
        F: Fn(&mut S) -> Result<(), MigrationFnError> + Send + Sync + 'static,
    {
        let module = module.into();
        if from_version == 0 {
            return Err(MigrationError::InvalidVersion {
                module,
                version: from_version,
            });
        }

        let registered = self
            .migrations
            .get(&module)
            .is_some_and(|chain| chain.contains_key(&from_version));
        if registered {
            return Err(MigrationError::DuplicateMigration {
                module,
                from_version,
            });
        }

        self.migrations
            .entry(module)
            .or_default()
            .insert(from_version, Box::new(migration));
        Ok(self)
    }

    /// Freeze the builder into an immutable registry.
    pub fn build(self) -> MigrationRegistry<S> {
        let registry = MigrationRegistry {
            id: RegistryId::next(),
            migrations: self.migrations,
        };
        tracing::debug!(
            registry = %registry.id,
            migrations = registry.len(),
            "migration registry built"
        );
        registry
    }
}

impl<S> Default for MigrationRegistryBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable mapping from `(module, from_version)` to a migration function.
pub struct MigrationRegistry<S> {
    id: RegistryId,
    migrations: MigrationTable<S>,
}

impl<S> MigrationRegistry<S> {
    /// Start building a registry.
    pub fn builder() -> MigrationRegistryBuilder<S> {
        MigrationRegistryBuilder::new()
    }

    /// Identity of this registry.
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Look up the migration of `module` from `from_version`.
    pub fn lookup(
        &self,
        module: &str,
        from_version: ConsensusVersion,
    ) -> Result<&MigrationFn<S>, MigrationError> {
        self.migrations
            .get(module)
            .and_then(|chain| chain.get(&from_version))
            .ok_or_else(|| MigrationError::MigrationNotFound {
                module: module.to_string(),
                from_version,
            })
    }

    /// Check if a migration is registered.
    pub fn contains(&self, module: &str, from_version: ConsensusVersion) -> bool {
        self.migrations
            .get(module)
            .is_some_and(|chain| chain.contains_key(&from_version))
    }

    /// Source versions registered for a module, ascending.
    pub fn migrations_for(&self, module: &str) -> Vec<ConsensusVersion> {
        self.migrations
            .get(module)
            .map(|chain| chain.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.values().map(BTreeMap::len).sum()
    }

    /// Check if no migrations are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> fmt::Debug for MigrationRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<_> = self.migrations.keys().collect();
        modules.sort();
        let entries: Vec<_> = modules
            .into_iter()
            .map(|m| (m, self.migrations_for(m)))
            .collect();
        f.debug_struct("MigrationRegistry")
            .field("id", &self.id)
            .field("migrations", &entries)
            .finish()
    }
}
