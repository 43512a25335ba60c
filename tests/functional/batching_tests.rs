//! Functional tests for snapshot creation batching

use crate::common::*;
use zfstools::batch::{do_new_snapshots, SnapshotBatcher};
use zfstools::{DatabaseKind, Dataset, DatasetGroups, ZfsToolsError};

const NAME: &str = "zfs-auto-snap_hourly-2025-05-05-17h45";

fn datasets(names: &[&str]) -> Vec<Dataset> {
    names.iter().map(|n| Dataset::new(*n)).collect()
}

#[test]
fn test_unbatched_one_call_per_dataset() {
    let catalog = FakeCatalog::new();
    let executor = RecordingExecutor::new();
    let batcher = SnapshotBatcher::new(&catalog, &executor, &hourly_config(3));

    batcher
        .create_many(NAME, &datasets(&["tank/a", "tank/b"]), false)
        .unwrap();

    let creates = executor.creates();
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[0], (vec![format!("tank/a@{}", NAME)], false, None));
    assert_eq!(creates[1].0, vec![format!("tank/b@{}", NAME)]);
}

#[test]
fn test_batched_groups_by_pool() {
    let catalog = FakeCatalog::new().batched(1 << 20);
    let executor = RecordingExecutor::new();
    let batcher = SnapshotBatcher::new(&catalog, &executor, &hourly_config(3));

    batcher
        .create_many("s", &datasets(&["dozer/x", "tank/a", "tank/b", "dozer/y"]), true)
        .unwrap();

    let creates = executor.creates();
    assert_eq!(
        creates,
        vec![
            (strings(&["dozer/x@s", "dozer/y@s"]), true, None),
            (strings(&["tank/a@s", "tank/b@s"]), true, None),
        ]
    );
}

#[test]
fn test_batches_respect_length_limit() {
    // 1024 bytes of margin leave 20: two targets of 9 bytes plus separator per call
    let catalog = FakeCatalog::new().batched(1024 + 20);
    let executor = RecordingExecutor::new();
    let batcher = SnapshotBatcher::new(&catalog, &executor, &hourly_config(3));
    let names = ["tank/a", "tank/b", "tank/c", "tank/d", "tank/e"];

    let plan = batcher.plan("ss", &datasets(&names)).unwrap();
    assert!(plan.batched);
    assert_eq!(plan.plain.len(), 3);
    for call in &plan.plain {
        let length: usize = call.targets.iter().map(|t| t.len() + 1).sum();
        assert!(length <= 20);
    }

    batcher.create_many("ss", &datasets(&names), false).unwrap();
    let mut targets: Vec<String> = executor.creates().into_iter().flat_map(|c| c.0).collect();
    targets.sort();
    assert_eq!(targets.len(), 5);
    assert_eq!(targets[0], "tank/a@ss");
}

#[test]
fn test_database_calls_go_first_and_alone() {
    let catalog = FakeCatalog::new().batched(1 << 20);
    let executor = RecordingExecutor::new();
    let batcher = SnapshotBatcher::new(&catalog, &executor, &hourly_config(3));
    let input = vec![
        Dataset::new("tank/a"),
        Dataset::new("tank/db").with_database(DatabaseKind::Mysql),
        Dataset::new("tank/pg").with_database(DatabaseKind::Postgresql),
        Dataset::new("tank/z"),
    ];

    batcher.create_many("s", &input, false).unwrap();

    let creates = executor.creates();
    assert_eq!(creates.len(), 3);
    assert_eq!(creates[0], (strings(&["tank/db@s"]), false, Some(DatabaseKind::Mysql)));
    assert_eq!(creates[1], (strings(&["tank/pg@s"]), false, Some(DatabaseKind::Postgresql)));
    assert_eq!(creates[2], (strings(&["tank/a@s", "tank/z@s"]), false, None));
}

#[test]
fn test_partial_failure_attempts_everything() {
    let catalog = FakeCatalog::new();
    let executor = RecordingExecutor::new().failing_on("tank/b@s");
    let batcher = SnapshotBatcher::new(&catalog, &executor, &hourly_config(3));

    let err = batcher
        .create_many("s", &datasets(&["tank/a", "tank/b", "tank/c"]), false)
        .unwrap_err();

    assert!(matches!(
        err,
        ZfsToolsError::SnapshotsFailed { failed: 1, attempted: 3 }
    ));
    assert_eq!(executor.creates().len(), 3);
}

#[test]
fn test_parallel_issues_same_calls() {
    let catalog = FakeCatalog::new();
    let executor = RecordingExecutor::new();
    let mut config = hourly_config(3);
    config.parallel = true;
    let batcher = SnapshotBatcher::new(&catalog, &executor, &config);

    batcher
        .create_many("s", &datasets(&["tank/a", "tank/b", "tank/c", "tank/d"]), true)
        .unwrap();

    let mut creates = executor.creates();
    creates.sort();
    assert_eq!(creates.len(), 4);
    assert!(creates.iter().all(|(targets, recursive, _)| targets.len() == 1 && *recursive));
    assert_eq!(creates[3].0, strings(&["tank/d@s"]));
}

#[test]
fn test_invalid_input_rejected_before_any_call() {
    let catalog = FakeCatalog::new();
    let executor = RecordingExecutor::new();
    let batcher = SnapshotBatcher::new(&catalog, &executor, &hourly_config(3));

    assert!(matches!(
        batcher.create_many("", &datasets(&["tank"]), false),
        Err(ZfsToolsError::EmptySnapshotName)
    ));
    assert!(matches!(
        batcher.create_many("s", &[], false),
        Err(ZfsToolsError::NoDatasets)
    ));
    assert!(matches!(
        batcher.create_many("a@b", &datasets(&["tank"]), false),
        Err(ZfsToolsError::InvalidSnapshotName { .. })
    ));
    assert!(matches!(
        batcher.create_many("s", &datasets(&["tank@x"]), false),
        Err(ZfsToolsError::InvalidSnapshotName { .. })
    ));
    assert!(executor.calls().is_empty());
}

#[test]
fn test_do_new_snapshots_single_then_recursive() {
    let catalog = FakeCatalog::new();
    let executor = RecordingExecutor::new();
    let groups = DatasetGroups {
        single: datasets(&["tank"]),
        recursive: datasets(&["tank/home"]),
        ..Default::default()
    };

    do_new_snapshots(&hourly_config(3), &catalog, &executor, &groups).unwrap();

    assert_eq!(
        executor.creates(),
        vec![
            (strings(&["tank@zfs-auto-snap_hourly-2025-05-05-17h45"]), false, None),
            (strings(&["tank/home@zfs-auto-snap_hourly-2025-05-05-17h45"]), true, None),
        ]
    );
}

#[test]
fn test_do_new_snapshots_reports_combined_failures() {
    let catalog = FakeCatalog::new();
    let executor = RecordingExecutor::new().failing_on(&format!("tank/home@{}", NAME));
    let groups = DatasetGroups {
        single: datasets(&["tank"]),
        recursive: datasets(&["tank/home", "tank/srv"]),
        ..Default::default()
    };

    let err = do_new_snapshots(&hourly_config(3), &catalog, &executor, &groups).unwrap_err();
    assert!(matches!(
        err,
        ZfsToolsError::SnapshotsFailed { failed: 1, attempted: 3 }
    ));
}
