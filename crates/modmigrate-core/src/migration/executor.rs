//! Migration executor - runs a plan against a state transaction.
//!
//! Every step runs against the same state handle; there is no per-step
//! commit. The executor only produces the new version map, committing or
//! discarding the state is left to the caller.

use std::time::{Duration, Instant};

use super::error::MigrationError;
use super::plan::MigrationPlan;
use super::registry::MigrationRegistry;
use crate::metrics::SharedMigrationMetrics;
use crate::version::VersionMap;

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// The version map to persist together with the migrated state.
    pub version_map: VersionMap,
    /// Steps executed.
    pub steps_executed: usize,
    /// Wall time spent in migration functions.
    pub elapsed: Duration,
}

/// Runs migration plans.
pub struct Executor<'a, S> {
    registry: &'a MigrationRegistry<S>,
    metrics: Option<SharedMigrationMetrics>,
}

impl<'a, S> Executor<'a, S> {
    /// Create an executor over the registry plans were computed against.
    pub fn new(registry: &'a MigrationRegistry<S>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    /// Record step and run outcomes in `metrics`.
    pub fn with_metrics(mut self, metrics: SharedMigrationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run every step of `plan` against `state`, in order.
    ///
    /// Stops at the first failing step. On any error no version map is
    /// returned and the caller must discard `state`.
    pub fn run(&self, plan: &MigrationPlan, state: &mut S) -> Result<MigrationResult, MigrationError> {
        if plan.registry_id() != self.registry.id() {
            return Err(MigrationError::RegistryChanged {
                message: format!(
                    "plan was computed against {}, executor holds {}",
                    plan.registry_id(),
                    self.registry.id()
                ),
            });
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_upgrade_started();
        }

        let started = Instant::now();
        let mut versions = plan.base().clone();

        for (step_index, step) in plan.steps().iter().enumerate() {
            let migration = match self.registry.lookup(&step.module, step.from_version) {
                Ok(migration) => migration,
                Err(_) => {
                    self.record_failure(false);
                    return Err(MigrationError::RegistryChanged {
                        message: format!("step {} ({}) has no registered migration", step_index, step),
                    });
                }
            };

            tracing::debug!(
                step_index,
                module = %step.module,
                from_version = step.from_version,
                to_version = step.to_version,
                "running migration step"
            );

            let step_started = Instant::now();
            if let Err(source) = migration(&mut *state) {
                tracing::error!(
                    step_index,
                    module = %step.module,
                    from_version = step.from_version,
                    to_version = step.to_version,
                    error = %source,
                    "migration step failed"
                );
                self.record_failure(true);
                return Err(MigrationError::MigrationFailed {
                    step_index,
                    module: step.module.clone(),
                    from_version: step.from_version,
                    to_version: step.to_version,
                    source,
                });
            }

            let duration_us = step_started.elapsed().as_micros() as u64;
            if let Some(metrics) = &self.metrics {
                metrics.record_step(&step.module, duration_us);
            }
            versions.set(step.module.clone(), step.to_version);

            tracing::debug!(
                step_index,
                module = %step.module,
                version = step.to_version,
                duration_us,
                "migration step complete"
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_upgrade_succeeded();
        }

        let elapsed = started.elapsed();
        tracing::info!(
            steps = plan.len(),
            modules = plan.modules().len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "migrations complete"
        );

        Ok(MigrationResult {
            version_map: versions,
            steps_executed: plan.len(),
            elapsed,
        })
    }

    fn record_failure(&self, step_failed: bool) {
        if let Some(metrics) = &self.metrics {
            if step_failed {
                metrics.record_step_failed();
            }
            metrics.record_upgrade_failed();
        }
    }
}
