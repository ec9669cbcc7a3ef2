//! Migration plans.
//!
//! A plan is the validated, ordered list of single-version steps an upgrade
//! will execute. It holds only step identities; the migration functions are
//! resolved from the registry again at execution time.

use std::fmt;

use super::registry::RegistryId;
use crate::version::{ConsensusVersion, VersionMap};

/// One consecutive version transition of one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationStep {
    /// The module name.
    pub module: String,
    /// Version the module's state is in before the step.
    pub from_version: ConsensusVersion,
    /// Version after the step. Always `from_version + 1`.
    pub to_version: ConsensusVersion,
}

impl MigrationStep {
    /// Create the step migrating `module` from `from_version` to the next version.
    pub fn new(module: impl Into<String>, from_version: ConsensusVersion) -> Self {
        Self {
            module: module.into(),
            from_version,
            to_version: from_version + 1,
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} -> v{}", self.module, self.from_version, self.to_version)
    }
}

/// An ordered, validated sequence of migration steps.
///
/// Steps of a module are contiguous and strictly increasing with no gaps.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Registry the plan was validated against.
    pub(crate) registry_id: RegistryId,
    /// Version map the plan starts from.
    pub(crate) base: VersionMap,
    /// Ordered steps.
    pub(crate) steps: Vec<MigrationStep>,
    /// Modules that have steps, in execution order.
    pub(crate) modules: Vec<String>,
    /// Every catalog module, in the order the ordering policy resolved.
    pub(crate) order: Vec<String>,
}

impl MigrationPlan {
    /// The ordered steps.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if no step needs to run.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps of a single module, in order.
    pub fn steps_for<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a MigrationStep> + 'a {
        self.steps.iter().filter(move |step| step.module == module)
    }

    /// Modules that migrate, in execution order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Every catalog module in resolved order, including modules with no
    /// steps. New modules are initialized in this order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// The version map the plan was computed from.
    pub fn base(&self) -> &VersionMap {
        &self.base
    }

    /// Identity of the registry the plan was validated against.
    pub fn registry_id(&self) -> RegistryId {
        self.registry_id
    }

    /// The version map a successful run of this plan produces.
    pub fn target_versions(&self) -> VersionMap {
        let mut versions = self.base.clone();
        for step in &self.steps {
            versions.set(step.module.clone(), step.to_version);
        }
        versions
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "no migrations");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
