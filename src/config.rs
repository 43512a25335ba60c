//! Policy configuration, snapshot naming and tool discovery

use crate::error::{Result, ZfsToolsError};
use crate::{DEFAULT_SNAPSHOT_PREFIX, SNAPSHOT_PROPERTY, SNAPSHOT_TIME_FORMAT};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::env;
use std::path::PathBuf;

/// Settings for one snapshot/cleanup run
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval label, e.g. "frequent", "hourly", "daily"
    pub interval: String,
    pub snapshot_prefix: String,
    /// Snapshots to retain per dataset; 0 skips creation
    pub keep: usize,
    pub use_utc: bool,
    pub parallel: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub debug: bool,
    pub destroy_zero_sized: bool,
    pub show_progress: bool,
    /// Captured once when the run starts
    pub timestamp: DateTime<FixedOffset>,
}

impl Config {
    pub fn new(interval: impl Into<String>, keep: usize) -> Self {
        Self::at(interval, keep, Local::now().fixed_offset())
    }

    /// Configuration with an explicit run timestamp
    pub fn at(interval: impl Into<String>, keep: usize, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            interval: interval.into(),
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
            keep,
            use_utc: false,
            parallel: false,
            dry_run: false,
            verbose: false,
            debug: false,
            destroy_zero_sized: true,
            show_progress: false,
            timestamp,
        }
    }

    /// Reject values that would produce malformed snapshot names
    pub fn validate(&self) -> Result<()> {
        validate_name_component("interval", &self.interval)?;
        self.validate_prefix()
    }

    pub fn validate_prefix(&self) -> Result<()> {
        validate_name_component("snapshot prefix", &self.snapshot_prefix)
    }

    /// `<prefix>_<interval>-`, shared by every snapshot this policy owns
    pub fn snapshot_prefix_interval(&self) -> String {
        format!("{}_{}-", self.snapshot_prefix, self.interval)
    }

    /// Snapshot suffix for this run, e.g. `zfs-auto-snap_hourly-2025-05-05-17h45`
    pub fn snapshot_name(&self) -> String {
        if self.use_utc {
            let timestamp = self.timestamp.with_timezone(&Utc);
            format!(
                "{}{}U",
                self.snapshot_prefix_interval(),
                timestamp.format(SNAPSHOT_TIME_FORMAT)
            )
        } else {
            format!(
                "{}{}",
                self.snapshot_prefix_interval(),
                self.timestamp.format(SNAPSHOT_TIME_FORMAT)
            )
        }
    }

    /// Interval-specific override property
    pub fn interval_property(&self) -> String {
        format!("{}:{}", SNAPSHOT_PROPERTY, self.interval)
    }

    /// Properties the classifier needs from the catalog, in evaluation order
    pub fn catalog_properties(&self) -> Vec<String> {
        vec![
            self.interval_property(),
            SNAPSHOT_PROPERTY.to_string(),
            "mounted".to_string(),
        ]
    }
}

fn validate_name_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ZfsToolsError::config(format!("{} must not be empty", what)));
    }
    if value
        .chars()
        .any(|c| c == '@' || c == '/' || c.is_whitespace())
    {
        return Err(ZfsToolsError::config(format!(
            "{} '{}' must not contain '@', '/' or whitespace",
            what, value
        )));
    }
    Ok(())
}

/// Locations of the external binaries the ZFS collaborators invoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub zfs: PathBuf,
    pub zpool: PathBuf,
    pub getconf: PathBuf,
}

impl ToolPaths {
    /// Resolve binaries from `ZFSTOOLS_*` overrides, falling back to `$PATH`
    pub fn from_env() -> Self {
        Self {
            zfs: Self::discover("ZFSTOOLS_ZFS", "zfs"),
            zpool: Self::discover("ZFSTOOLS_ZPOOL", "zpool"),
            getconf: Self::discover("ZFSTOOLS_GETCONF", "getconf"),
        }
    }

    fn discover(var: &str, default: &str) -> PathBuf {
        match env::var(var) {
            Ok(path) if !path.trim().is_empty() => {
                log::debug!("Using {} from {}: {}", default, var, path);
                PathBuf::from(path)
            }
            _ => PathBuf::from(default),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            zfs: PathBuf::from("zfs"),
            zpool: PathBuf::from("zpool"),
            getconf: PathBuf::from("getconf"),
        }
    }
}
