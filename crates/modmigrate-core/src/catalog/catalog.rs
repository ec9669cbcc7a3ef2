//! Catalog of compiled modules.

use std::collections::HashMap;

use super::ModuleDef;
use crate::migration::MigrationError;
use crate::version::{ConsensusVersion, VersionMap};

/// The set of modules compiled into the application.
///
/// Modules keep their registration order, which is the order used by
/// [`OrderingPolicy::CatalogOrder`](crate::migration::OrderingPolicy::CatalogOrder).
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: Vec<ModuleDef>,
    index: HashMap<String, usize>,
}

impl ModuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from module definitions, in order.
    pub fn from_modules(
        modules: impl IntoIterator<Item = ModuleDef>,
    ) -> Result<Self, MigrationError> {
        let mut catalog = Self::new();
        for def in modules {
            catalog.register(def)?;
        }
        Ok(catalog)
    }

    /// Register a module.
    ///
    /// Fails if the name is already registered or the version is zero.
    pub fn register(&mut self, def: ModuleDef) -> Result<(), MigrationError> {
        if def.current_version == 0 {
            return Err(MigrationError::InvalidVersion {
                module: def.name,
                version: 0,
            });
        }
        if self.index.contains_key(&def.name) {
            return Err(MigrationError::DuplicateModule { module: def.name });
        }

        self.index.insert(def.name.clone(), self.modules.len());
        self.modules.push(def);
        Ok(())
    }

    /// Get a module definition by name.
    pub fn get(&self, name: &str) -> Option<&ModuleDef> {
        self.index.get(name).map(|&idx| &self.modules[idx])
    }

    /// Get the current version of a module.
    pub fn current_version(&self, name: &str) -> Option<ConsensusVersion> {
        self.get(name).map(|def| def.current_version)
    }

    /// Check if a module is in the catalog.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate over modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleDef> {
        self.modules.iter()
    }

    /// Module names in registration order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|def| def.name.as_str())
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The version map a fully upgraded application would record.
    pub fn current_versions(&self) -> VersionMap {
        self.modules
            .iter()
            .map(|def| (def.name.clone(), def.current_version))
            .collect()
    }
}
