//! Retention: zero-sized pruning and keep-count expiry of policy snapshots

use crate::catalog::VolumeCatalog;
use crate::config::Config;
use crate::error::{Result, ZfsToolsError};
use crate::executor::SnapshotExecutor;
use crate::model::{Dataset, Snapshot};
use crate::parallel::fan_out;
use crate::progress::ProgressReporter;
use crate::resolver::DatasetGroups;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshots grouped by owning dataset, newest first within each group
pub type GroupedSnapshots = BTreeMap<String, Vec<Snapshot>>;

/// What a cleanup pass destroyed (or would have, in dry-run mode)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub zero_sized: Vec<String>,
    pub expired: Vec<String>,
    pub attempted: usize,
    pub failed: usize,
}

impl CleanupReport {
    fn merge_zero_sized(&mut self, outcome: ZeroSizedOutcome) {
        self.zero_sized.extend(outcome.destroyed);
        self.attempted += outcome.attempted;
        self.failed += outcome.failed;
    }

    /// Fail with one aggregate error if any destroy failed
    pub fn into_result(self) -> Result<Self> {
        if self.failed > 0 {
            return Err(ZfsToolsError::DestroyFailed {
                failed: self.failed,
                attempted: self.attempted,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Default)]
struct ZeroSizedOutcome {
    kept: Vec<Snapshot>,
    destroyed: Vec<String>,
    attempted: usize,
    failed: usize,
}

/// Group snapshots by dataset, keeping only datasets in `datasets`
pub fn group_snapshots_into_datasets(
    snapshots: Vec<Snapshot>,
    datasets: &[Dataset],
) -> GroupedSnapshots {
    let known: HashSet<&str> = datasets.iter().map(|d| d.name.as_str()).collect();
    let mut grouped = GroupedSnapshots::new();
    for snapshot in snapshots {
        let Some(dataset) = snapshot.dataset_name() else {
            continue;
        };
        if !known.contains(dataset) {
            continue;
        }
        grouped.entry(dataset.to_string()).or_default().push(snapshot);
    }
    for snapshots in grouped.values_mut() {
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
    }
    grouped
}

/// Prunes snapshots belonging to one policy
pub struct RetentionEngine<'a> {
    catalog: &'a dyn VolumeCatalog,
    executor: &'a dyn SnapshotExecutor,
    prefix: String,
    prefix_interval: String,
    keep: usize,
    destroy_zero_sized: bool,
    parallel: bool,
    show_progress: bool,
    /// Set after any successful destroy; cached sizes are re-read while set
    sizes_stale: AtomicBool,
}

impl<'a> RetentionEngine<'a> {
    pub fn new(
        catalog: &'a dyn VolumeCatalog,
        executor: &'a dyn SnapshotExecutor,
        config: &Config,
    ) -> Self {
        Self {
            catalog,
            executor,
            prefix: format!("{}_", config.snapshot_prefix),
            prefix_interval: config.snapshot_prefix_interval(),
            keep: config.keep,
            destroy_zero_sized: config.destroy_zero_sized,
            parallel: config.parallel,
            show_progress: config.show_progress,
            sizes_stale: AtomicBool::new(false),
        }
    }

    pub fn sizes_stale(&self) -> bool {
        self.sizes_stale.load(Ordering::SeqCst)
    }

    fn destroy(&self, snapshot: &str) -> Result<()> {
        match self.executor.destroy(snapshot) {
            Ok(()) => {
                self.sizes_stale.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to destroy {}: {}", snapshot, e);
                Err(e)
            }
        }
    }

    /// Destroy every zero-sized snapshot except the newest one.
    ///
    /// Snapshots whose size cannot be read, or whose destroy fails, are kept.
    fn destroy_zero_sized_snapshots(&self, snapshots: Vec<Snapshot>) -> ZeroSizedOutcome {
        let mut outcome = ZeroSizedOutcome::default();
        let mut snapshots = snapshots.into_iter();
        let Some(newest) = snapshots.next() else {
            return outcome;
        };
        outcome.kept.push(newest);

        for mut snapshot in snapshots {
            let zero = match snapshot.is_zero_sized(self.catalog, self.sizes_stale()) {
                Ok(zero) => zero,
                Err(e) => {
                    log::warn!("Could not read size of {}, keeping it: {}", snapshot.name, e);
                    false
                }
            };
            if !zero {
                outcome.kept.push(snapshot);
                continue;
            }

            log::info!("Destroying zero-sized snapshot: {}", snapshot.name);
            outcome.attempted += 1;
            match self.destroy(&snapshot.name) {
                Ok(()) => outcome.destroyed.push(snapshot.name),
                Err(_) => {
                    outcome.failed += 1;
                    outcome.kept.push(snapshot);
                }
            }
        }
        outcome
    }

    /// Zero-size pruning across datasets; each dataset is one task
    fn datasets_destroy_zero_sized(
        &self,
        grouped: GroupedSnapshots,
        report: &mut CleanupReport,
    ) -> GroupedSnapshots {
        let groups: Vec<(String, Vec<Snapshot>)> = grouped.into_iter().collect();
        let outcomes = fan_out(groups, self.parallel, |(dataset, snapshots)| {
            (dataset, self.destroy_zero_sized_snapshots(snapshots))
        });

        let mut remaining = GroupedSnapshots::new();
        for (dataset, mut outcome) in outcomes {
            remaining.insert(dataset, std::mem::take(&mut outcome.kept));
            report.merge_zero_sized(outcome);
        }
        remaining
    }

    /// Prune this policy's snapshots on currently included datasets down to
    /// the keep count, removing zero-sized ones first when enabled
    pub fn cleanup_expired_snapshots(
        &self,
        pool: Option<&str>,
        groups: &DatasetGroups,
    ) -> Result<CleanupReport> {
        let snapshots: Vec<Snapshot> = self
            .catalog
            .list_snapshots(pool, true)?
            .into_iter()
            .filter(|s| s.name.contains(&self.prefix_interval))
            .collect();

        let mut grouped = group_snapshots_into_datasets(snapshots, &groups.included);
        let mut report = CleanupReport::default();

        if self.destroy_zero_sized {
            grouped = self.datasets_destroy_zero_sized(grouped, &mut report);
        }

        let expired: Vec<String> = grouped
            .into_values()
            .flat_map(|snapshots| snapshots.into_iter().skip(self.keep))
            .map(|s| s.name)
            .collect();

        let mut progress = ProgressReporter::for_tasks(
            self.show_progress,
            expired.len(),
            "Destroying expired snapshots",
        );
        let results = fan_out(expired, self.parallel, |name| {
            log::info!("Destroying expired snapshot: {}", name);
            let result = self.destroy(&name);
            progress.inc();
            (name, result)
        });
        progress.finish("Expired snapshots destroyed");

        for (name, result) in results {
            report.attempted += 1;
            match result {
                Ok(()) => report.expired.push(name),
                Err(_) => report.failed += 1,
            }
        }

        report.into_result()
    }

    /// Remove zero-sized snapshots not created by any auto-snapshot policy,
    /// always keeping the newest such snapshot per dataset
    pub fn cleanup_zero_sized_snapshots(&self, pool: Option<&str>) -> Result<CleanupReport> {
        let mut candidates = Vec::new();
        for mut snapshot in self.catalog.list_snapshots(pool, true)? {
            if snapshot.name.contains(&self.prefix) {
                continue;
            }
            match snapshot.is_zero_sized(self.catalog, false) {
                Ok(true) => candidates.push(snapshot),
                Ok(false) => {}
                Err(e) => log::warn!("Could not read size of {}, skipping: {}", snapshot.name, e),
            }
        }

        let datasets = self.catalog.list_datasets(pool, &[])?;
        let grouped = group_snapshots_into_datasets(candidates, &datasets);

        let mut report = CleanupReport::default();
        self.datasets_destroy_zero_sized(grouped, &mut report);
        report.into_result()
    }
}
