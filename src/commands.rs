//! Command implementations for zfstools CLI

use crate::batch::do_new_snapshots;
use crate::catalog::{VolumeCatalog, ZfsCatalog};
use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::{Config, ToolPaths};
use crate::error::{Result, ZfsToolsError};
use crate::executor::{SnapshotExecutor, ZfsExecutor};
use crate::model::DatabaseKind;
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::resolver::find_eligible_datasets;
use crate::retention::{CleanupReport, RetentionEngine};
use chrono::{DateTime, FixedOffset};

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub verbose: bool,
    pub debug: bool,
    pub dry_run: bool,
    pub parallel: bool,
    pub pool: Option<String>,
    pub progress: bool,
}

impl RunOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbose: cli.verbose,
            debug: cli.debug,
            dry_run: cli.dry_run,
            parallel: cli.parallel,
            pool: cli.pool.clone(),
            progress: cli.progress,
        }
    }

    /// Log filter for this run: Debug with `--debug`, Info otherwise
    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    /// Policy configuration for `interval`, timestamped now
    pub fn config(&self, interval: &str, keep: usize) -> Config {
        let mut config = Config::new(interval, keep);
        config.verbose = self.verbose;
        config.debug = self.debug;
        config.dry_run = self.dry_run;
        config.parallel = self.parallel;
        config.show_progress = self.progress && !self.verbose;
        config
    }
}

/// Execute a command
pub fn execute_command(command: Commands, options: &RunOptions) -> Result<()> {
    let tools = ToolPaths::from_env();
    let catalog = ZfsCatalog::new(tools.clone());
    let pool = options.pool.as_deref();

    match command {
        Commands::AutoSnapshot {
            interval,
            keep,
            prefix,
            utc,
            keep_zero_sized,
        } => {
            let mut config = options.config(&interval, keep);
            config.snapshot_prefix = prefix;
            config.use_utc = utc;
            config.destroy_zero_sized = !keep_zero_sized;
            config.validate()?;

            let executor = ZfsExecutor::for_config(tools, &config);
            let report = run_auto_snapshot(&config, &catalog, &executor, pool)?;
            if options.verbose || options.dry_run {
                PrettyPrinter::print_cleanup_report(&report, options.dry_run);
            }
            Ok(())
        }
        Commands::CleanupSnapshots { prefix } => {
            let mut config = options.config("cleanup", 0);
            config.snapshot_prefix = prefix;
            config.validate_prefix()?;

            let executor = ZfsExecutor::for_config(tools, &config);
            let report = RetentionEngine::new(&catalog, &executor, &config)
                .cleanup_zero_sized_snapshots(pool)?;
            if options.verbose || options.dry_run {
                PrettyPrinter::print_cleanup_report(&report, options.dry_run);
            }
            Ok(())
        }
        Commands::SnapshotMysql { dataset } => {
            let config = options.config("mysql", 0);
            let executor = ZfsExecutor::for_config(tools, &config);
            let target = run_snapshot_mysql(&executor, &dataset, config.timestamp)?;
            log::info!("Created {}", target);
            Ok(())
        }
        Commands::Eligible { interval, format } => {
            let format = OutputFormat::parse(&format).map_err(ZfsToolsError::config)?;
            let config = options.config(&interval, 0);
            config.validate()?;

            let groups = find_eligible_datasets(&catalog, &config, pool)?;
            match format {
                OutputFormat::Pretty => PrettyPrinter::print_dataset_groups(&interval, &groups),
                OutputFormat::Json => {
                    println!("{}", JsonFormatter::format_dataset_groups(&interval, &groups)?)
                }
            }
            Ok(())
        }
    }
}

/// One auto-snapshot run: resolve datasets, snapshot them (unless keep is 0),
/// then expire old snapshots.
///
/// A partial create failure does not stop cleanup; it is reported after
/// cleanup has been attempted.
pub fn run_auto_snapshot(
    config: &Config,
    catalog: &dyn VolumeCatalog,
    executor: &dyn SnapshotExecutor,
    pool: Option<&str>,
) -> Result<CleanupReport> {
    let groups = find_eligible_datasets(catalog, config, pool)?;

    let created = if config.keep > 0 && !groups.is_empty() {
        do_new_snapshots(config, catalog, executor, &groups)
    } else {
        Ok(())
    };
    let created = match created {
        Err(e) if !e.is_partial_failure() => return Err(e),
        other => other,
    };

    let cleaned =
        RetentionEngine::new(catalog, executor, config).cleanup_expired_snapshots(pool, &groups);
    created?;
    cleaned
}

/// Recursively snapshot `dataset` as `dataset@<timestamp>` under a MySQL read lock
pub fn run_snapshot_mysql(
    executor: &dyn SnapshotExecutor,
    dataset: &str,
    timestamp: DateTime<FixedOffset>,
) -> Result<String> {
    if dataset.is_empty() || dataset.contains('@') {
        return Err(ZfsToolsError::invalid_snapshot_name(dataset));
    }
    let target = format!("{}@{}", dataset, timestamp.format("%Y-%m-%dT%H:%M:%S"));
    executor.create(std::slice::from_ref(&target), true, Some(DatabaseKind::Mysql))?;
    Ok(target)
}
