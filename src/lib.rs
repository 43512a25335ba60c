//! # zfstools
//!
//! Automatic ZFS snapshot management: decides which datasets to snapshot,
//! creates the snapshots in as few `zfs snapshot` calls as possible and prunes
//! old ones according to a retention policy.

pub mod batch;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod output;
pub mod parallel;
pub mod progress;
pub mod resolver;
pub mod retention;

pub use catalog::{VolumeCatalog, ZfsCatalog};
pub use config::Config;
pub use error::{Result, ZfsToolsError};
pub use executor::{SnapshotExecutor, ZfsExecutor};
pub use model::{DatabaseKind, Dataset, Snapshot};
pub use resolver::DatasetGroups;

/// User property holding the auto-snapshot opt-in/opt-out value
pub const SNAPSHOT_PROPERTY: &str = "com.sun:auto-snapshot";

/// Default snapshot name prefix
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "zfs-auto-snap";

/// Timestamp layout embedded in snapshot names
pub const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%d-%Hh%M";

/// Argument length assumed when `getconf ARG_MAX` is unavailable
pub const FALLBACK_ARG_MAX: usize = 4096;

/// Bytes held back from the argument limit when batching snapshot targets
pub const ARG_MAX_SAFETY_MARGIN: usize = 1024;
