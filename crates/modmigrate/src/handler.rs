//! Upgrade handler.
//!
//! Glues the engine to the state store: read the recorded version map, plan,
//! run every step inside one transaction, initialize new modules, then commit
//! the migrated state and the new version map together.

use std::sync::Arc;

use modmigrate_core::{
    Executor, MigrationPlan, MigrationRegistry, ModuleCatalog, Planner, SharedMigrationMetrics,
    StateStore, StateTransaction, VersionMap,
};

use crate::config::UpgradeConfig;
use crate::error::UpgradeError;
use crate::genesis::ModuleInitializers;

/// Outcome of an upgrade.
#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    /// The plan that ran, or would run for a dry run.
    pub plan: MigrationPlan,
    /// The committed version map. For a dry run, the map already recorded.
    pub version_map: VersionMap,
    /// Modules initialized on first run, in the plan's module order. For a
    /// dry run, the modules that would be.
    pub initialized: Vec<String>,
    /// Modules dropped from the version map.
    pub pruned: Vec<String>,
    /// Whether nothing was executed or committed.
    pub dry_run: bool,
}

impl UpgradeOutcome {
    /// Check if the upgrade changed nothing.
    pub fn is_noop(&self) -> bool {
        self.plan.is_empty() && self.initialized.is_empty() && self.pruned.is_empty()
    }
}

/// Runs upgrades against a [`StateStore`].
pub struct UpgradeHandler {
    config: UpgradeConfig,
    registry: Arc<MigrationRegistry<StateTransaction>>,
    initializers: ModuleInitializers,
    metrics: Option<SharedMigrationMetrics>,
}

impl UpgradeHandler {
    /// Create a handler with an empty registry and no initializers.
    pub fn new(config: UpgradeConfig) -> Self {
        Self {
            config,
            registry: Arc::new(MigrationRegistry::builder().build()),
            initializers: ModuleInitializers::new(),
            metrics: None,
        }
    }

    /// Use `registry` for planning and execution.
    pub fn with_registry(mut self, registry: Arc<MigrationRegistry<StateTransaction>>) -> Self {
        self.registry = registry;
        self
    }

    /// Use `initializers` for modules added by an upgrade.
    pub fn with_initializers(mut self, initializers: ModuleInitializers) -> Self {
        self.initializers = initializers;
        self
    }

    /// Record executor metrics.
    pub fn with_metrics(mut self, metrics: SharedMigrationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// The migration registry.
    pub fn registry(&self) -> &Arc<MigrationRegistry<StateTransaction>> {
        &self.registry
    }

    /// Compute the plan [`apply`](Self::apply) would execute.
    pub fn plan_only(
        &self,
        store: &StateStore,
        catalog: &ModuleCatalog,
    ) -> Result<MigrationPlan, UpgradeError> {
        let recorded = store.version_map()?;
        Ok(self.planner().plan(&recorded, catalog)?)
    }

    /// Upgrade `store` to the versions declared by `catalog`.
    ///
    /// On error nothing is committed and the store keeps its previous state
    /// and version map. The application must not continue running.
    pub fn apply(
        &self,
        store: &StateStore,
        catalog: &ModuleCatalog,
    ) -> Result<UpgradeOutcome, UpgradeError> {
        let result = self.run_upgrade(store, catalog);
        if let Err(e) = &result {
            tracing::error!(
                module = e.module().unwrap_or("-"),
                error = %e,
                "upgrade failed, state left unchanged"
            );
        }
        result
    }

    fn planner(&self) -> Planner<'_, StateTransaction> {
        Planner::new(&self.registry).with_policy(self.config.ordering.clone())
    }

    fn run_upgrade(
        &self,
        store: &StateStore,
        catalog: &ModuleCatalog,
    ) -> Result<UpgradeOutcome, UpgradeError> {
        let recorded = store.version_map()?;
        let plan = self.planner().plan(&recorded, catalog)?;

        tracing::info!(
            recorded = %recorded,
            steps = plan.len(),
            dry_run = self.config.dry_run,
            "upgrade planned"
        );

        if self.config.dry_run {
            let initialized = if self.config.initialize_new_modules {
                new_modules(&recorded, &plan)
            } else {
                Vec::new()
            };
            let pruned = if self.config.prune_removed_modules {
                removed_modules(&recorded, catalog)
            } else {
                Vec::new()
            };
            return Ok(UpgradeOutcome {
                plan,
                version_map: recorded,
                initialized,
                pruned,
                dry_run: true,
            });
        }

        // Dropping `tx` on any early return discards every buffered write.
        let mut tx = store.transaction();

        let mut executor = Executor::new(&self.registry);
        if let Some(metrics) = &self.metrics {
            executor = executor.with_metrics(Arc::clone(metrics));
        }
        let mut versions = executor.run(&plan, &mut tx)?.version_map;

        let initialized = if self.config.initialize_new_modules {
            self.initialize_new_modules(&plan, catalog, &mut versions, &mut tx)?
        } else {
            Vec::new()
        };

        let pruned = if self.config.prune_removed_modules {
            let pruned = removed_modules(&versions, catalog);
            versions.retain(|module, _| catalog.contains(module));
            for module in &pruned {
                tracing::info!(module = %module, "module removed from version map");
            }
            pruned
        } else {
            Vec::new()
        };

        self.verify(catalog, &versions)?;

        tx.stage_version_map(&versions);
        let writes = tx.operation_count();
        tx.commit()?;

        tracing::info!(
            version_map = %versions,
            steps = plan.len(),
            initialized = initialized.len(),
            pruned = pruned.len(),
            writes,
            "upgrade committed"
        );

        Ok(UpgradeOutcome {
            plan,
            version_map: versions,
            initialized,
            pruned,
            dry_run: false,
        })
    }

    fn initialize_new_modules(
        &self,
        plan: &MigrationPlan,
        catalog: &ModuleCatalog,
        versions: &mut VersionMap,
        tx: &mut StateTransaction,
    ) -> Result<Vec<String>, UpgradeError> {
        let mut initialized = Vec::new();

        for module in new_modules(versions, plan) {
            let Some(version) = catalog.current_version(&module) else {
                continue;
            };

            if let Some(init) = self.initializers.get(&module) {
                init(&mut *tx).map_err(|source| UpgradeError::Initialization {
                    module: module.clone(),
                    source,
                })?;
            }

            tracing::info!(
                module = %module,
                version,
                has_initializer = self.initializers.contains(&module),
                "module initialized"
            );
            versions.set(module.clone(), version);
            initialized.push(module);
        }

        Ok(initialized)
    }

    /// Every recorded catalog module must sit at its current version. With
    /// initialization enabled every catalog module must also be recorded.
    fn verify(&self, catalog: &ModuleCatalog, versions: &VersionMap) -> Result<(), UpgradeError> {
        for def in catalog.iter() {
            let recorded = versions.get(&def.name);
            let ok = match recorded {
                Some(version) => version == def.current_version,
                None => !self.config.initialize_new_modules,
            };
            if !ok {
                return Err(UpgradeError::VersionMismatch {
                    module: def.name.clone(),
                    expected: def.current_version,
                    recorded,
                });
            }
        }
        Ok(())
    }
}

/// Catalog modules with no recorded version, in the plan's module order.
fn new_modules(versions: &VersionMap, plan: &MigrationPlan) -> Vec<String> {
    plan.order()
        .iter()
        .filter(|module| !versions.contains(module))
        .cloned()
        .collect()
}

/// Recorded modules the catalog no longer declares, in name order.
fn removed_modules(versions: &VersionMap, catalog: &ModuleCatalog) -> Vec<String> {
    versions
        .modules()
        .filter(|module| !catalog.contains(module))
        .map(str::to_string)
        .collect()
}
