//! Snapshot creation: database hooks, batched multi-target calls, fan-out

use crate::catalog::VolumeCatalog;
use crate::config::Config;
use crate::error::{Result, ZfsToolsError};
use crate::executor::SnapshotExecutor;
use crate::model::{DatabaseKind, Dataset};
use crate::parallel::fan_out;
use crate::progress::ProgressReporter;
use crate::resolver::DatasetGroups;
use crate::ARG_MAX_SAFETY_MARGIN;
use std::collections::BTreeMap;

/// One `zfs snapshot` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub targets: Vec<String>,
    pub database: Option<DatabaseKind>,
}

/// Calls needed to snapshot a group of datasets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePlan {
    /// Hook-wrapped calls, one per database dataset, issued first
    pub database: Vec<CreateCall>,
    pub plain: Vec<CreateCall>,
    /// Whether `plain` holds multi-target batches
    pub batched: bool,
}

impl CreatePlan {
    pub fn call_count(&self) -> usize {
        self.database.len() + self.plain.len()
    }
}

/// Outcome counts for a set of create calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub attempted: usize,
    pub failed: usize,
}

impl BatchTally {
    fn record(&mut self, result: &Result<()>) {
        self.attempted += 1;
        if result.is_err() {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: BatchTally) {
        self.attempted += other.attempted;
        self.failed += other.failed;
    }

    pub fn into_result(self) -> Result<()> {
        if self.failed > 0 {
            return Err(ZfsToolsError::SnapshotsFailed {
                failed: self.failed,
                attempted: self.attempted,
            });
        }
        Ok(())
    }
}

/// Creates one named snapshot across many datasets
pub struct SnapshotBatcher<'a> {
    catalog: &'a dyn VolumeCatalog,
    executor: &'a dyn SnapshotExecutor,
    parallel: bool,
    show_progress: bool,
}

impl<'a> SnapshotBatcher<'a> {
    pub fn new(
        catalog: &'a dyn VolumeCatalog,
        executor: &'a dyn SnapshotExecutor,
        config: &Config,
    ) -> Self {
        Self {
            catalog,
            executor,
            parallel: config.parallel,
            show_progress: config.show_progress,
        }
    }

    /// Snapshot every dataset as `dataset@snapshot_name`, attempting all
    /// targets and failing once at the end if any call failed
    pub fn create_many(
        &self,
        snapshot_name: &str,
        datasets: &[Dataset],
        recursive: bool,
    ) -> Result<()> {
        self.create_many_tally(snapshot_name, datasets, recursive)?
            .into_result()
    }

    /// Like [`create_many`](Self::create_many) but returns the raw counts
    pub fn create_many_tally(
        &self,
        snapshot_name: &str,
        datasets: &[Dataset],
        recursive: bool,
    ) -> Result<BatchTally> {
        let plan = self.plan(snapshot_name, datasets)?;
        let mut progress = ProgressReporter::for_tasks(
            self.show_progress,
            plan.call_count(),
            "Creating snapshots",
        );

        let mut tally = BatchTally::default();
        let run = |call: CreateCall| {
            let result = self.executor.create(&call.targets, recursive, call.database);
            if let Err(e) = &result {
                log::warn!("Failed to create {}: {}", call.targets.join(" "), e);
            }
            progress.inc();
            result
        };

        for result in fan_out(plan.database, self.parallel, &run) {
            tally.record(&result);
        }
        // Batches go out one at a time; single-target calls follow the parallel flag
        let parallel_plain = self.parallel && !plan.batched;
        for result in fan_out(plan.plain, parallel_plain, &run) {
            tally.record(&result);
        }

        progress.finish("Snapshots created");
        Ok(tally)
    }

    /// Validate inputs and work out which calls to issue
    pub fn plan(&self, snapshot_name: &str, datasets: &[Dataset]) -> Result<CreatePlan> {
        if snapshot_name.is_empty() {
            return Err(ZfsToolsError::EmptySnapshotName);
        }
        if snapshot_name.contains('@') || snapshot_name.contains('/') {
            return Err(ZfsToolsError::invalid_snapshot_name(snapshot_name));
        }
        if datasets.is_empty() {
            return Err(ZfsToolsError::NoDatasets);
        }
        if let Some(bad) = datasets
            .iter()
            .find(|d| d.name.is_empty() || d.name.contains('@'))
        {
            return Err(ZfsToolsError::invalid_snapshot_name(bad.name.as_str()));
        }

        let target = |dataset: &Dataset| format!("{}@{}", dataset.name, snapshot_name);
        let (databases, plain): (Vec<&Dataset>, Vec<&Dataset>) =
            datasets.iter().partition(|d| d.database.is_some());

        let database = databases
            .into_iter()
            .map(|d| CreateCall {
                targets: vec![target(d)],
                database: d.database,
            })
            .collect();

        let batched = !plain.is_empty() && self.catalog.supports_batched_snapshots();
        let plain = if batched {
            let budget = self
                .catalog
                .command_length_limit()
                .saturating_sub(ARG_MAX_SAFETY_MARGIN);

            let mut by_pool: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for dataset in plain {
                by_pool.entry(dataset.pool()).or_default().push(target(dataset));
            }
            by_pool
                .into_values()
                .flat_map(|targets| chunk_targets(targets, budget))
                .map(|targets| CreateCall {
                    targets,
                    database: None,
                })
                .collect()
        } else {
            plain
                .into_iter()
                .map(|d| CreateCall {
                    targets: vec![target(d)],
                    database: None,
                })
                .collect()
        };

        Ok(CreatePlan {
            database,
            plain,
            batched,
        })
    }
}

/// Split targets into chunks whose combined length, counting one separator
/// per target, stays within `budget`. A target longer than the budget is
/// placed in a chunk of its own.
pub fn chunk_targets(targets: Vec<String>, budget: usize) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut used = 0;
    for target in targets {
        let cost = target.len() + 1;
        if !current.is_empty() && used + cost > budget {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        used += cost;
        current.push(target);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Take this run's snapshot of every single and recursive dataset
pub fn do_new_snapshots(
    config: &Config,
    catalog: &dyn VolumeCatalog,
    executor: &dyn SnapshotExecutor,
    groups: &DatasetGroups,
) -> Result<()> {
    let name = config.snapshot_name();
    let batcher = SnapshotBatcher::new(catalog, executor, config);
    log::info!(
        "Creating snapshot {} ({} single, {} recursive)",
        name,
        groups.single.len(),
        groups.recursive.len()
    );

    let mut tally = BatchTally::default();
    if !groups.single.is_empty() {
        tally.merge(batcher.create_many_tally(&name, &groups.single, false)?);
    }
    if !groups.recursive.is_empty() {
        tally.merge(batcher.create_many_tally(&name, &groups.recursive, true)?);
    }
    tally.into_result()
}
