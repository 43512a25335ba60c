//! Functional tests for zero-sized pruning and keep-count expiry

use crate::common::*;
use zfstools::retention::RetentionEngine;
use zfstools::{Config, Dataset, DatasetGroups, ZfsToolsError};

fn included(names: &[&str]) -> DatasetGroups {
    DatasetGroups {
        included: names.iter().map(|n| Dataset::new(*n)).collect(),
        ..Default::default()
    }
}

/// Catalog holding hourly snapshots of `dataset` at 10h45..(10+count-1)h45
fn hourly_history(dataset: &str, count: u32, used: i64) -> FakeCatalog {
    (0..count).fold(FakeCatalog::new(), |catalog, i| {
        catalog.with_snapshot(&hourly_snapshot(dataset, 10 + i), used)
    })
}

fn keep_zero_sized(mut config: Config) -> Config {
    config.destroy_zero_sized = false;
    config
}

#[test]
fn test_keep_newest_n() {
    let catalog = hourly_history("tank/a", 5, 4096);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(3));

    let report = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();

    let expected = vec![hourly_snapshot("tank/a", 10), hourly_snapshot("tank/a", 11)];
    assert_eq!(executor.destroyed(), expected);
    assert_eq!(report.expired.len(), 2);
    assert!(report.zero_sized.is_empty());
}

#[test]
fn test_zero_sized_pruned_but_newest_kept() {
    let catalog = hourly_history("tank/a", 5, 0);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(3));

    let report = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();

    assert_eq!(report.zero_sized.len(), 4);
    assert!(report.expired.is_empty());
    assert!(!executor.destroyed().contains(&hourly_snapshot("tank/a", 14)));
    assert!(engine.sizes_stale());
}

#[test]
fn test_keep_zero_sized_flag() {
    let catalog = hourly_history("tank/a", 5, 0);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &keep_zero_sized(hourly_config(3)));

    let report = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();

    assert!(report.zero_sized.is_empty());
    assert_eq!(report.expired.len(), 2);
    assert_eq!(catalog.size_reads(), 0);
}

#[test]
fn test_sizes_reread_after_destroy() {
    // Listed as zero, but 11h45 grows once 12h45 is gone
    let catalog = FakeCatalog::new()
        .with_snapshot(&hourly_snapshot("tank/a", 13), 0)
        .with_snapshot(&hourly_snapshot("tank/a", 12), 0)
        .with_changing_snapshot(&hourly_snapshot("tank/a", 11), 0, Some(8192));
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(10));

    assert!(!engine.sizes_stale());
    let report = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();

    assert_eq!(report.zero_sized, vec![hourly_snapshot("tank/a", 12)]);
    assert_eq!(catalog.size_reads(), 1);
    assert!(engine.sizes_stale());
}

#[test]
fn test_unreadable_size_keeps_snapshot() {
    let catalog = FakeCatalog::new()
        .with_snapshot(&hourly_snapshot("tank/a", 13), 0)
        .with_snapshot(&hourly_snapshot("tank/a", 12), 0)
        .with_changing_snapshot(&hourly_snapshot("tank/a", 11), 0, None);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(10));

    engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();

    assert_eq!(executor.destroyed(), vec![hourly_snapshot("tank/a", 12)]);
}

#[test]
fn test_only_included_datasets_and_own_policy() {
    let catalog = hourly_history("tank/a", 3, 4096)
        .with_snapshot(&hourly_snapshot("tank/excluded", 10), 4096)
        .with_snapshot(&hourly_snapshot("tank/excluded", 11), 4096)
        .with_snapshot("tank/a@zfs-auto-snap_daily-2025-05-01-00h00", 4096)
        .with_snapshot("tank/a@manual-backup", 4096)
        .with_snapshot("tank/a@other_hourly-2025-05-05-09h45", 4096);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(1));

    engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();

    assert_eq!(
        executor.destroyed(),
        vec![hourly_snapshot("tank/a", 10), hourly_snapshot("tank/a", 11)]
    );
}

#[test]
fn test_keep_zero_destroys_all_policy_snapshots() {
    let catalog = hourly_history("tank/a", 3, 4096);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(0));

    let report = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap();
    assert_eq!(report.expired.len(), 3);
}

#[test]
fn test_destroy_failure_is_aggregated() {
    let catalog = hourly_history("tank/a", 5, 4096);
    let executor = RecordingExecutor::new().failing_on(&hourly_snapshot("tank/a", 10));
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(2));

    let err = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a"]))
        .unwrap_err();

    assert!(matches!(
        err,
        ZfsToolsError::DestroyFailed { failed: 1, attempted: 3 }
    ));
    assert_eq!(executor.destroyed().len(), 3);
}

#[test]
fn test_parallel_cleanup_across_datasets() {
    let catalog = (0..4).fold(FakeCatalog::new(), |catalog, i| {
        catalog
            .with_snapshot(&hourly_snapshot("tank/a", 10 + i), 4096)
            .with_snapshot(&hourly_snapshot("tank/b", 10 + i), 4096)
    });
    let executor = RecordingExecutor::new();
    let mut config = hourly_config(2);
    config.parallel = true;
    let engine = RetentionEngine::new(&catalog, &executor, &config);

    let report = engine
        .cleanup_expired_snapshots(None, &included(&["tank/a", "tank/b"]))
        .unwrap();

    assert_eq!(report.expired.len(), 4);
    assert_eq!(
        executor.destroyed(),
        vec![
            hourly_snapshot("tank/a", 10),
            hourly_snapshot("tank/a", 11),
            hourly_snapshot("tank/b", 10),
            hourly_snapshot("tank/b", 11),
        ]
    );
}

#[test]
fn test_cleanup_foreign_zero_sized() {
    let catalog = FakeCatalog::new()
        .with_datasets(vec![filesystem("tank"), filesystem("tank/a")])
        .with_snapshot("tank/a@backup-3", 0)
        .with_snapshot("tank/a@backup-2", 0)
        .with_snapshot("tank/a@backup-1", 0)
        .with_snapshot("tank/a@big", 1 << 20)
        .with_snapshot(&hourly_snapshot("tank/a", 10), 0)
        .with_snapshot("tank@only", 0);
    let executor = RecordingExecutor::new();
    let engine = RetentionEngine::new(&catalog, &executor, &hourly_config(0));

    let report = engine.cleanup_zero_sized_snapshots(None).unwrap();

    assert_eq!(
        executor.destroyed(),
        vec!["tank/a@backup-1".to_string(), "tank/a@backup-2".to_string()]
    );
    assert_eq!(report.zero_sized.len(), 2);
}
