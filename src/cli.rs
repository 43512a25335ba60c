//! Command-line interface for zfstools

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "zfstools")]
#[command(about = "Automatic ZFS snapshot creation and retention")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show what is being done
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show debug output, including every zfs/zpool invocation
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Dry run: show what would be done without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Create and destroy snapshots in parallel
    #[arg(short, long, global = true)]
    pub parallel: bool,

    /// Act only on the specified pool
    #[arg(short = 'P', long, global = true)]
    pub pool: Option<String>,

    /// Show a progress bar for create/destroy operations
    #[arg(long, global = true)]
    pub progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Snapshot eligible datasets and expire old snapshots of this interval
    AutoSnapshot {
        /// Interval label, e.g. "frequent", "hourly", "daily"
        interval: String,

        /// Snapshots to keep per dataset (0 only cleans up)
        #[arg(value_parser = validate_keep)]
        keep: usize,

        /// Snapshot name prefix
        #[arg(short = 's', long, default_value = crate::DEFAULT_SNAPSHOT_PREFIX)]
        prefix: String,

        /// Use UTC for snapshot timestamps
        #[arg(short, long)]
        utc: bool,

        /// Keep zero-sized snapshots
        #[arg(short, long)]
        keep_zero_sized: bool,
    },

    /// Destroy zero-sized snapshots not created by auto-snapshot
    CleanupSnapshots {
        /// Auto-snapshot prefix whose snapshots are left alone
        #[arg(short = 's', long, default_value = crate::DEFAULT_SNAPSHOT_PREFIX)]
        prefix: String,
    },

    /// Take a recursive snapshot of one dataset under a MySQL read lock
    SnapshotMysql {
        /// Dataset to snapshot
        dataset: String,
    },

    /// Show which datasets an interval would snapshot, and how
    Eligible {
        /// Interval label
        interval: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Validate the KEEP argument
fn validate_keep(s: &str) -> Result<usize, String> {
    s.parse::<usize>()
        .map_err(|_| format!("Invalid KEEP value: '{}'. Must be a non-negative integer.", s))
}
