//! Upgrade and migration metrics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::histogram::Histogram;

/// Counters describing upgrade attempts and the steps they ran.
pub struct MigrationMetrics {
    upgrades_started: AtomicU64,
    upgrades_succeeded: AtomicU64,
    upgrades_failed: AtomicU64,

    steps_executed: AtomicU64,
    steps_failed: AtomicU64,
    step_latency: Histogram,
    steps_by_module: RwLock<HashMap<String, u64>>,
}

impl MigrationMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self {
            upgrades_started: AtomicU64::new(0),
            upgrades_succeeded: AtomicU64::new(0),
            upgrades_failed: AtomicU64::new(0),
            steps_executed: AtomicU64::new(0),
            steps_failed: AtomicU64::new(0),
            step_latency: Histogram::step_latency(),
            steps_by_module: RwLock::new(HashMap::new()),
        }
    }

    /// Record the start of an upgrade run.
    pub fn record_upgrade_started(&self) {
        self.upgrades_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run whose every step succeeded.
    pub fn record_upgrade_succeeded(&self) {
        self.upgrades_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aborted run.
    pub fn record_upgrade_failed(&self) {
        self.upgrades_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful step.
    pub fn record_step(&self, module: &str, duration_us: u64) {
        self.steps_executed.fetch_add(1, Ordering::Relaxed);
        self.step_latency.observe(duration_us);
        *self
            .steps_by_module
            .write()
            .entry(module.to_string())
            .or_insert(0) += 1;
    }

    /// Record a failed step.
    pub fn record_step_failed(&self) {
        self.steps_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Upgrade runs started.
    pub fn upgrades_started(&self) -> u64 {
        self.upgrades_started.load(Ordering::Relaxed)
    }

    /// Upgrade runs that succeeded.
    pub fn upgrades_succeeded(&self) -> u64 {
        self.upgrades_succeeded.load(Ordering::Relaxed)
    }

    /// Upgrade runs that failed.
    pub fn upgrades_failed(&self) -> u64 {
        self.upgrades_failed.load(Ordering::Relaxed)
    }

    /// Steps that ran to success.
    pub fn steps_executed(&self) -> u64 {
        self.steps_executed.load(Ordering::Relaxed)
    }

    /// Steps whose migration function failed.
    pub fn steps_failed(&self) -> u64 {
        self.steps_failed.load(Ordering::Relaxed)
    }

    /// Successful steps per module.
    pub fn steps_by_module(&self) -> HashMap<String, u64> {
        self.steps_by_module.read().clone()
    }

    /// Step latency histogram.
    pub fn step_latency(&self) -> &Histogram {
        &self.step_latency
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = [
            ("modmigrate_upgrades_started_total", "Upgrade runs started", self.upgrades_started()),
            ("modmigrate_upgrades_succeeded_total", "Upgrade runs that succeeded", self.upgrades_succeeded()),
            ("modmigrate_upgrades_failed_total", "Upgrade runs that failed", self.upgrades_failed()),
            ("modmigrate_steps_executed_total", "Migration steps executed", self.steps_executed()),
            ("modmigrate_steps_failed_total", "Migration steps that failed", self.steps_failed()),
        ];
        for (name, help, value) in counters {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n\n", name, value));
        }

        out.push_str("# HELP modmigrate_module_steps_total Migration steps executed per module\n");
        out.push_str("# TYPE modmigrate_module_steps_total counter\n");
        let mut by_module: Vec<_> = self.steps_by_module().into_iter().collect();
        by_module.sort();
        for (module, count) in by_module {
            out.push_str(&format!(
                "modmigrate_module_steps_total{{module=\"{}\"}} {}\n",
                module, count
            ));
        }
        out.push('\n');

        out.push_str("# HELP modmigrate_step_duration_us_p99 P99 step duration in microseconds\n");
        out.push_str("# TYPE modmigrate_step_duration_us_p99 gauge\n");
        out.push_str(&format!(
            "modmigrate_step_duration_us_p99 {}\n",
            self.step_latency.percentile(0.99)
        ));

        out
    }

    /// Reset all metrics (for testing).
    pub fn reset(&self) {
        self.upgrades_started.store(0, Ordering::Relaxed);
        self.upgrades_succeeded.store(0, Ordering::Relaxed);
        self.upgrades_failed.store(0, Ordering::Relaxed);
        self.steps_executed.store(0, Ordering::Relaxed);
        self.steps_failed.store(0, Ordering::Relaxed);
        self.step_latency.reset();
        self.steps_by_module.write().clear();
    }
}

impl Default for MigrationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedMigrationMetrics = Arc<MigrationMetrics>;

/// Create a new shared metrics handle.
pub fn new_shared_metrics() -> SharedMigrationMetrics {
    Arc::new(MigrationMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_metrics() {
        let metrics = MigrationMetrics::new();
        metrics.record_step("bank", 1_000);
        metrics.record_step("bank", 3_000);
        metrics.record_step("staking", 500);
        metrics.record_step_failed();

        assert_eq!(metrics.steps_executed(), 3);
        assert_eq!(metrics.steps_failed(), 1);
        assert_eq!(metrics.step_latency().count(), 3);

        let by_module = metrics.steps_by_module();
        assert_eq!(by_module.get("bank"), Some(&2));
        assert_eq!(by_module.get("staking"), Some(&1));
    }

    #[test]
    fn test_upgrade_counters() {
        let metrics = MigrationMetrics::new();
        metrics.record_upgrade_started();
        metrics.record_upgrade_succeeded();
        metrics.record_upgrade_started();
        metrics.record_upgrade_failed();

        assert_eq!(metrics.upgrades_started(), 2);
        assert_eq!(metrics.upgrades_succeeded(), 1);
        assert_eq!(metrics.upgrades_failed(), 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MigrationMetrics::new();
        metrics.record_upgrade_started();
        metrics.record_step("bank", 100);

        let text = metrics.to_prometheus();
        assert!(text.contains("# TYPE modmigrate_steps_executed_total counter"));
        assert!(text.contains("modmigrate_upgrades_started_total 1"));
        assert!(text.contains("modmigrate_module_steps_total{module=\"bank\"} 1"));
    }

    #[test]
    fn test_reset() {
        let metrics = MigrationMetrics::new();
        metrics.record_upgrade_started();
        metrics.record_step("bank", 100);

        metrics.reset();

        assert_eq!(metrics.upgrades_started(), 0);
        assert_eq!(metrics.steps_executed(), 0);
        assert!(metrics.steps_by_module().is_empty());
    }

    #[test]
    fn test_shared_metrics() {
        let metrics = new_shared_metrics();
        let clone = Arc::clone(&metrics);
        clone.record_step("bank", 10);
        assert_eq!(metrics.steps_executed(), 1);
    }
}
