//! First-run initialization of modules added by an upgrade.
//!
//! A module that appears in the catalog but not in the recorded version map
//! has no state to migrate. Its initializer writes the initial state instead,
//! and the module is recorded at its current version.

use std::collections::HashMap;
use std::fmt;

use modmigrate_core::{MigrationFnError, StateTransaction};

use crate::error::UpgradeError;

/// Writes a new module's initial state.
pub type InitFn = Box<dyn Fn(&mut StateTransaction) -> Result<(), MigrationFnError> + Send + Sync>;

/// Initializers keyed by module name.
///
/// Modules without an initializer are still recorded at their current
/// version on first run; they simply start with no state.
#[derive(Default)]
pub struct ModuleInitializers {
    initializers: HashMap<String, InitFn>,
}

impl ModuleInitializers {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the initializer for `module`.
    pub fn register<F>(&mut self, module: impl Into<String>, init: F) -> Result<&mut Self, UpgradeError>
    where
        F: Fn(&mut StateTransaction) -> Result<(), MigrationFnError> + Send + Sync + 'static,
    {
        let module = module.into();
        if self.initializers.contains_key(&module) {
            return Err(UpgradeError::DuplicateInitializer { module });
        }
        self.initializers.insert(module, Box::new(init));
        Ok(self)
    }

    /// The initializer for `module`, if one is registered.
    pub fn get(&self, module: &str) -> Option<&InitFn> {
        self.initializers.get(module)
    }

    /// Check if `module` has an initializer.
    pub fn contains(&self, module: &str) -> bool {
        self.initializers.contains_key(module)
    }

    /// Number of registered initializers.
    pub fn len(&self) -> usize {
        self.initializers.len()
    }

    /// Check if no initializer is registered.
    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
    }
}

impl fmt::Debug for ModuleInitializers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<_> = self.initializers.keys().collect();
        modules.sort();
        f.debug_struct("ModuleInitializers")
            .field("modules", &modules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modmigrate_core::StateStore;

    #[test]
    fn test_register_and_run() {
        let mut inits = ModuleInitializers::new();
        inits
            .register("gov", |tx: &mut StateTransaction| {
                tx.put(b"gov/params", b"{}");
                Ok(())
            })
            .unwrap();

        assert!(inits.contains("gov"));
        assert!(!inits.contains("bank"));
        assert_eq!(inits.len(), 1);

        let store = StateStore::temporary().unwrap();
        let mut tx = store.transaction();
        (inits.get("gov").unwrap())(&mut tx).unwrap();
        assert_eq!(tx.get(b"gov/params").unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut inits = ModuleInitializers::new();
        inits.register("gov", |_: &mut StateTransaction| Ok(())).unwrap();

        let err = inits
            .register("gov", |_: &mut StateTransaction| Ok(()))
            .unwrap_err();
        assert!(matches!(err, UpgradeError::DuplicateInitializer { module } if module == "gov"));
    }

    #[test]
    fn test_debug_lists_modules() {
        let mut inits = ModuleInitializers::new();
        inits.register("staking", |_: &mut StateTransaction| Ok(())).unwrap();
        inits.register("auth", |_: &mut StateTransaction| Ok(())).unwrap();
        assert_eq!(
            format!("{:?}", inits),
            r#"ModuleInitializers { modules: ["auth", "staking"] }"#
        );
    }
}
