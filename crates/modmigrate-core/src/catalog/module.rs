//! Module definitions.

use crate::version::ConsensusVersion;

/// A module compiled into the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDef {
    /// Module name (unique within the catalog).
    pub name: String,
    /// Consensus version of the compiled code.
    pub current_version: ConsensusVersion,
    /// Modules whose migrations must run before this module's.
    pub migrate_after: Vec<String>,
}

impl ModuleDef {
    /// Create a new module definition.
    pub fn new(name: impl Into<String>, current_version: ConsensusVersion) -> Self {
        Self {
            name: name.into(),
            current_version,
            migrate_after: Vec::new(),
        }
    }

    /// Require this module to migrate after `module`.
    pub fn after(mut self, module: impl Into<String>) -> Self {
        self.migrate_after.push(module.into());
        self
    }

    /// Require this module to migrate after each of `modules`.
    pub fn after_all<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.migrate_after.extend(modules.into_iter().map(Into::into));
        self
    }

    /// Check if this module carries any ordering hints.
    pub fn has_hints(&self) -> bool {
        !self.migrate_after.is_empty()
    }
}
