//! Upgrade configuration.

use modmigrate_core::OrderingPolicy;

/// Upgrade handler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeConfig {
    /// How module groups are ordered in the plan.
    pub ordering: OrderingPolicy,

    /// Compute the plan but do not run or commit anything.
    pub dry_run: bool,

    /// Initialize modules the recorded version map does not know yet and
    /// record them at their current version.
    pub initialize_new_modules: bool,

    /// Drop version map entries for modules no longer in the catalog.
    pub prune_removed_modules: bool,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::default(),
            dry_run: false,
            initialize_new_modules: true,
            prune_removed_modules: false,
        }
    }
}

impl UpgradeConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ordering policy.
    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Order modules by an explicit list naming every catalog module.
    pub fn with_explicit_order<I, S>(self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_ordering(OrderingPolicy::Explicit(
            order.into_iter().map(Into::into).collect(),
        ))
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable first-run initialization of new modules.
    pub fn with_initialize_new_modules(mut self, enabled: bool) -> Self {
        self.initialize_new_modules = enabled;
        self
    }

    /// Enable or disable pruning of removed modules.
    pub fn with_prune_removed_modules(mut self, enabled: bool) -> Self {
        self.prune_removed_modules = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UpgradeConfig::default();
        assert_eq!(config.ordering, OrderingPolicy::DependencyHints);
        assert!(!config.dry_run);
        assert!(config.initialize_new_modules);
        assert!(!config.prune_removed_modules);
    }

    #[test]
    fn test_builder() {
        let config = UpgradeConfig::new()
            .with_explicit_order(["staking", "bank"])
            .with_dry_run(true)
            .with_initialize_new_modules(false)
            .with_prune_removed_modules(true);

        assert_eq!(
            config.ordering,
            OrderingPolicy::Explicit(vec!["staking".to_string(), "bank".to_string()])
        );
        assert!(config.dry_run);
        assert!(!config.initialize_new_modules);
        assert!(config.prune_removed_modules);
    }
}
