//! Migration planning.
//!
//! Diffs the recorded version map against the module catalog and produces a
//! [`MigrationPlan`]. Planning never touches state: a regression, a missing
//! migration, or an ordering cycle is reported before anything executes.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::error::MigrationError;
use super::plan::{MigrationPlan, MigrationStep};
use super::registry::MigrationRegistry;
use crate::catalog::{ModuleCatalog, ModuleDef};
use crate::version::VersionMap;

/// How module groups are ordered within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Topological order over the catalog's "migrate after" hints, ties
    /// broken by module name.
    #[default]
    DependencyHints,
    /// Catalog registration order. Hints are ignored.
    CatalogOrder,
    /// A caller supplied total order naming every catalog module once.
    Explicit(Vec<String>),
}

/// Computes migration plans against a registry.
pub struct Planner<'a, S> {
    registry: &'a MigrationRegistry<S>,
    policy: OrderingPolicy,
}

impl<'a, S> Planner<'a, S> {
    /// Create a planner using the default ordering policy.
    pub fn new(registry: &'a MigrationRegistry<S>) -> Self {
        Self {
            registry,
            policy: OrderingPolicy::default(),
        }
    }

    /// Set the ordering policy.
    pub fn with_policy(mut self, policy: OrderingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active ordering policy.
    pub fn policy(&self) -> &OrderingPolicy {
        &self.policy
    }

    /// Plan the migrations needed to bring `recorded` up to `catalog`.
    pub fn plan(
        &self,
        recorded: &VersionMap,
        catalog: &ModuleCatalog,
    ) -> Result<MigrationPlan, MigrationError> {
        let order = order_modules(catalog, &self.policy)?;

        let mut steps = Vec::new();
        let mut modules = Vec::new();
        let mut resolved = Vec::with_capacity(order.len());

        for def in order {
            resolved.push(def.name.clone());
            let module_steps = self.module_steps(recorded, def)?;
            if !module_steps.is_empty() {
                modules.push(def.name.clone());
                steps.extend(module_steps);
            }
        }

        tracing::info!(
            registry = %self.registry.id(),
            modules = modules.len(),
            steps = steps.len(),
            "migration plan computed"
        );

        Ok(MigrationPlan {
            registry_id: self.registry.id(),
            base: recorded.clone(),
            steps,
            modules,
            order: resolved,
        })
    }

    fn module_steps(
        &self,
        recorded: &VersionMap,
        def: &ModuleDef,
    ) -> Result<Vec<MigrationStep>, MigrationError> {
        let module = def.name.as_str();
        let target = def.current_version;

        let Some(from) = recorded.get(module) else {
            tracing::debug!(module, version = target, "no recorded version, first run");
            return Ok(Vec::new());
        };

        if from == 0 {
            return Err(MigrationError::InvalidVersion {
                module: module.to_string(),
                version: from,
            });
        }

        if from > target {
            return Err(MigrationError::VersionRegression {
                module: module.to_string(),
                recorded: from,
                target,
            });
        }

        if from == target {
            tracing::debug!(module, version = from, "module up to date");
            return Ok(Vec::new());
        }

        let mut steps = Vec::with_capacity((target - from) as usize);
        for version in from..target {
            if !self.registry.contains(module, version) {
                return Err(MigrationError::MigrationNotFound {
                    module: module.to_string(),
                    from_version: version,
                });
            }
            steps.push(MigrationStep::new(module, version));
        }

        tracing::debug!(
            module,
            from_version = from,
            to_version = target,
            steps = steps.len(),
            "module needs migration"
        );
        Ok(steps)
    }
}

/// Order every catalog module according to `policy`.
fn order_modules<'c>(
    catalog: &'c ModuleCatalog,
    policy: &OrderingPolicy,
) -> Result<Vec<&'c ModuleDef>, MigrationError> {
    match policy {
        OrderingPolicy::CatalogOrder => Ok(catalog.iter().collect()),
        OrderingPolicy::Explicit(order) => explicit_order(catalog, order),
        OrderingPolicy::DependencyHints => topological_order(catalog),
    }
}

fn explicit_order<'c>(
    catalog: &'c ModuleCatalog,
    order: &[String],
) -> Result<Vec<&'c ModuleDef>, MigrationError> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(order.len());

    for name in order {
        let def = catalog.get(name).ok_or_else(|| MigrationError::InvalidOrder {
            message: format!("module {} is not in the catalog", name),
        })?;
        if !seen.insert(name.as_str()) {
            return Err(MigrationError::InvalidOrder {
                message: format!("module {} appears more than once", name),
            });
        }
        ordered.push(def);
    }

    let missing: Vec<_> = catalog
        .module_names()
        .filter(|name| !seen.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(MigrationError::InvalidOrder {
            message: format!("modules missing from order: {}", missing.join(", ")),
        });
    }

    Ok(ordered)
}

/// Kahn's algorithm with a name-ordered ready set, so the result is
/// deterministic regardless of catalog registration order.
fn topological_order(catalog: &ModuleCatalog) -> Result<Vec<&ModuleDef>, MigrationError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(catalog.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for def in catalog.iter() {
        if !def.has_hints() {
            in_degree.insert(def.name.as_str(), 0);
            continue;
        }

        let mut deps = BTreeSet::new();
        for dep in &def.migrate_after {
            if catalog.contains(dep) {
                deps.insert(dep.as_str());
            } else {
                tracing::debug!(
                    module = %def.name,
                    after = %dep,
                    "ignoring ordering hint for module not in catalog"
                );
            }
        }

        in_degree.insert(def.name.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(def.name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&name, _)| name)
        .collect();
    let mut ordered = Vec::with_capacity(catalog.len());

    while let Some(name) = ready.pop_first() {
        if let Some(def) = catalog.get(name) {
            ordered.push(def);
        }
        for &dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if ordered.len() < catalog.len() {
        let mut blocked: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        blocked.sort();
        return Err(MigrationError::OrderingCycle { modules: blocked });
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{MigrationFnError, MigrationRegistryBuilder};

    type Log = Vec<String>;

    fn noop(_: &mut Log) -> Result<(), MigrationFnError> {
        Ok(())
    }

    fn registry(entries: &[(&str, u64)]) -> MigrationRegistry<Log> {
        let mut builder = MigrationRegistryBuilder::new();
        for &(module, from) in entries {
            builder.register(module, from, noop).unwrap();
        }
        builder.build()
    }

    fn catalog(defs: impl IntoIterator<Item = ModuleDef>) -> ModuleCatalog {
        ModuleCatalog::from_modules(defs).unwrap()
    }

    fn step_keys(plan: &MigrationPlan) -> Vec<(String, u64, u64)> {
        plan.steps()
            .iter()
            .map(|s| (s.module.clone(), s.from_version, s.to_version))
            .collect()
    }

    #[test]
    fn test_first_run_module_is_skipped() {
        let registry = registry(&[("a", 1), ("a", 2)]);
        let catalog = catalog([ModuleDef::new("a", 3), ModuleDef::new("b", 1)]);
        let recorded = VersionMap::new().with("a", 1);

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();

        assert_eq!(
            step_keys(&plan),
            vec![("a".to_string(), 1, 2), ("a".to_string(), 2, 3)]
        );
        assert_eq!(plan.modules(), &["a".to_string()]);
        assert_eq!(plan.target_versions(), VersionMap::new().with("a", 3));
    }

    #[test]
    fn test_up_to_date_is_empty() {
        let registry = registry(&[]);
        let catalog = catalog([ModuleDef::new("a", 2)]);
        let recorded = VersionMap::new().with("a", 2);

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.target_versions(), recorded);
    }

    #[test]
    fn test_version_regression() {
        let registry = registry(&[]);
        let catalog = catalog([ModuleDef::new("a", 2)]);
        let recorded = VersionMap::new().with("a", 3);

        let result = Planner::new(&registry).plan(&recorded, &catalog);

        assert!(matches!(
            result,
            Err(MigrationError::VersionRegression { recorded: 3, target: 2, .. })
        ));
    }

    #[test]
    fn test_incomplete_chain() {
        let registry = registry(&[("a", 1)]);
        let catalog = catalog([ModuleDef::new("a", 3)]);
        let recorded = VersionMap::new().with("a", 1);

        let result = Planner::new(&registry).plan(&recorded, &catalog);

        assert!(matches!(
            result,
            Err(MigrationError::MigrationNotFound { ref module, from_version: 2 }) if module == "a"
        ));
    }

    #[test]
    fn test_zero_recorded_version() {
        let registry = registry(&[]);
        let catalog = catalog([ModuleDef::new("a", 1)]);
        let recorded = VersionMap::new().with("a", 0);

        let result = Planner::new(&registry).plan(&recorded, &catalog);
        assert!(matches!(result, Err(MigrationError::InvalidVersion { version: 0, .. })));
    }

    #[test]
    fn test_hint_orders_groups() {
        let registry = registry(&[("a", 1), ("b", 1)]);
        // "a" sorts first by name, so the hint has to override it.
        let catalog = catalog([ModuleDef::new("a", 2).after("b"), ModuleDef::new("b", 2)]);
        let recorded = VersionMap::new().with("a", 1).with("b", 1);

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();
        assert_eq!(plan.modules(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_b_after_a() {
        let registry = registry(&[("a", 1), ("b", 1)]);
        let catalog = catalog([ModuleDef::new("b", 2).after("a"), ModuleDef::new("a", 2)]);
        let recorded = VersionMap::new().with("a", 1).with("b", 1);

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();
        assert_eq!(
            step_keys(&plan),
            vec![("a".to_string(), 1, 2), ("b".to_string(), 1, 2)]
        );
    }

    #[test]
    fn test_ties_broken_by_name() {
        let registry = registry(&[("alpha", 1), ("beta", 1), ("gamma", 1)]);
        let catalog = catalog([
            ModuleDef::new("gamma", 2),
            ModuleDef::new("beta", 2),
            ModuleDef::new("alpha", 2),
        ]);
        let recorded: VersionMap = [("alpha", 1), ("beta", 1), ("gamma", 1)].into_iter().collect();

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();
        assert_eq!(plan.modules(), &["alpha", "beta", "gamma"].map(String::from));
    }

    #[test]
    fn test_cycle_detected() {
        let registry = registry(&[]);
        let catalog = catalog([
            ModuleDef::new("a", 1).after("c"),
            ModuleDef::new("b", 1).after("a"),
            ModuleDef::new("c", 1).after("b"),
            ModuleDef::new("d", 1),
        ]);

        let result = Planner::new(&registry).plan(&VersionMap::new(), &catalog);

        match result {
            Err(MigrationError::OrderingCycle { modules }) => {
                assert_eq!(modules, vec!["a", "b", "c"]);
            }
            other => panic!("expected ordering cycle, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_cycle_reports_modules_blocked_behind_it() {
        let registry = registry(&[]);
        let catalog = catalog([
            ModuleDef::new("a", 1).after("b"),
            ModuleDef::new("b", 1).after("a"),
            ModuleDef::new("c", 1).after("a"),
            ModuleDef::new("d", 1),
        ]);

        let err = Planner::new(&registry)
            .plan(&VersionMap::new(), &catalog)
            .unwrap_err();

        assert!(err.to_string().contains("could not be ordered"));
        match err {
            MigrationError::OrderingCycle { modules } => {
                assert_eq!(modules, vec!["a", "b", "c"]);
            }
            other => panic!("expected ordering cycle, got {other}"),
        }
    }

    #[test]
    fn test_order_covers_modules_without_steps() {
        let registry = registry(&[("b", 1)]);
        let catalog = catalog([
            ModuleDef::new("x", 1).after("y"),
            ModuleDef::new("y", 1),
            ModuleDef::new("b", 2).after("x"),
        ]);
        let recorded = VersionMap::new().with("b", 1);

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();
        assert_eq!(plan.modules(), &["b".to_string()]);
        assert_eq!(plan.order(), &["y", "x", "b"].map(String::from));

        let plan = Planner::new(&registry)
            .with_policy(OrderingPolicy::CatalogOrder)
            .plan(&recorded, &catalog)
            .unwrap();
        assert_eq!(plan.order(), &["x", "y", "b"].map(String::from));
    }

    #[test]
    fn test_self_hint_is_a_cycle() {
        let registry = registry(&[]);
        let catalog = catalog([ModuleDef::new("a", 1).after("a")]);

        let result = Planner::new(&registry).plan(&VersionMap::new(), &catalog);
        assert!(matches!(result, Err(MigrationError::OrderingCycle { .. })));
    }

    #[test]
    fn test_unknown_hint_ignored() {
        let registry = registry(&[("a", 1)]);
        let catalog = catalog([ModuleDef::new("a", 2).after("removed")]);
        let recorded = VersionMap::new().with("a", 1);

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_catalog_order_ignores_hints() {
        let registry = registry(&[("a", 1), ("b", 1)]);
        let catalog = catalog([
            ModuleDef::new("b", 2),
            ModuleDef::new("a", 2).after("b").after("a"),
        ]);
        let recorded = VersionMap::new().with("a", 1).with("b", 1);

        let plan = Planner::new(&registry)
            .with_policy(OrderingPolicy::CatalogOrder)
            .plan(&recorded, &catalog)
            .unwrap();
        assert_eq!(plan.modules(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_explicit_order() {
        let registry = registry(&[("a", 1), ("b", 1)]);
        let catalog = catalog([ModuleDef::new("a", 2), ModuleDef::new("b", 2)]);
        let recorded = VersionMap::new().with("a", 1).with("b", 1);

        let plan = Planner::new(&registry)
            .with_policy(OrderingPolicy::Explicit(vec!["b".into(), "a".into()]))
            .plan(&recorded, &catalog)
            .unwrap();
        assert_eq!(plan.modules(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_explicit_order_must_be_complete() {
        let registry = registry(&[]);
        let catalog = catalog([ModuleDef::new("a", 1), ModuleDef::new("b", 1)]);
        let planner = Planner::new(&registry);

        let missing = planner
            .with_policy(OrderingPolicy::Explicit(vec!["a".into()]))
            .plan(&VersionMap::new(), &catalog);
        assert!(matches!(missing, Err(MigrationError::InvalidOrder { .. })));

        let planner = Planner::new(&registry);
        let unknown = planner
            .with_policy(OrderingPolicy::Explicit(vec!["a".into(), "b".into(), "c".into()]))
            .plan(&VersionMap::new(), &catalog);
        assert!(matches!(unknown, Err(MigrationError::InvalidOrder { .. })));

        let planner = Planner::new(&registry);
        let repeated = planner
            .with_policy(OrderingPolicy::Explicit(vec!["a".into(), "a".into(), "b".into()]))
            .plan(&VersionMap::new(), &catalog);
        assert!(matches!(repeated, Err(MigrationError::InvalidOrder { .. })));
    }

    #[test]
    fn test_chains_are_contiguous_and_gap_free() {
        let registry = registry(&[
            ("a", 1), ("a", 2), ("a", 3),
            ("b", 4), ("b", 5),
            ("c", 1),
        ]);
        let catalog = catalog([
            ModuleDef::new("c", 2).after("a"),
            ModuleDef::new("b", 6),
            ModuleDef::new("a", 4).after("b"),
        ]);
        let recorded: VersionMap = [("a", 1), ("b", 4), ("c", 1)].into_iter().collect();

        let plan = Planner::new(&registry).plan(&recorded, &catalog).unwrap();

        for module in plan.modules() {
            let positions: Vec<_> = plan
                .steps()
                .iter()
                .enumerate()
                .filter(|(_, s)| &s.module == module)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(positions.last().unwrap() - positions[0] + 1, positions.len());

            let versions: Vec<_> = plan.steps_for(module).map(|s| s.from_version).collect();
            for pair in versions.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
            for step in plan.steps_for(module) {
                assert_eq!(step.to_version, step.from_version + 1);
            }
        }
        assert_eq!(plan.modules(), &["b", "a", "c"].map(String::from));
        assert_eq!(plan.target_versions(), catalog.current_versions());
    }
}
