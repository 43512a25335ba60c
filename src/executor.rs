//! Side-effecting snapshot operations: create and destroy

use crate::config::{Config, ToolPaths};
use crate::error::{Result, ZfsToolsError};
use crate::model::DatabaseKind;
use std::fmt;
use std::process::Command;

/// Performs snapshot create/destroy calls on behalf of the engines
pub trait SnapshotExecutor: Send + Sync {
    /// Create every `targets` entry (`dataset@name`) in one call, optionally
    /// recursive and wrapped in a database consistency hook
    fn create(
        &self,
        targets: &[String],
        recursive: bool,
        database: Option<DatabaseKind>,
    ) -> Result<()>;

    /// Destroy a single snapshot
    fn destroy(&self, snapshot: &str) -> Result<()>;
}

/// A fully formed command line, runnable or printable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotCommand {
    Direct { program: String, args: Vec<String> },
    Shell { script: String },
}

impl SnapshotCommand {
    /// `zfs snapshot [-r] targets...`, wrapped in a database hook when requested
    pub fn create(
        zfs: &str,
        targets: &[String],
        recursive: bool,
        database: Option<DatabaseKind>,
    ) -> Self {
        let mut args = vec!["snapshot".to_string()];
        if recursive {
            args.push("-r".to_string());
        }
        args.extend(targets.iter().cloned());

        let Some(kind) = database else {
            return Self::Direct {
                program: zfs.to_string(),
                args,
            };
        };

        let snapshot = format!("{} {}", zfs, args.join(" "));
        let script = match kind {
            DatabaseKind::Mysql => format!(
                "mysql -e \"FLUSH LOGS; FLUSH TABLES WITH READ LOCK; SYSTEM {}; UNLOCK TABLES;\"",
                snapshot
            ),
            DatabaseKind::Postgresql => format!(
                "(psql -c \"SELECT PG_START_BACKUP('zfs-auto-snapshot');\" postgres ; {} ) ; \
                 psql -c \"SELECT PG_STOP_BACKUP();\" postgres",
                snapshot
            ),
        };
        Self::Shell { script }
    }

    /// `zfs destroy -d snapshot`
    pub fn destroy(zfs: &str, snapshot: &str) -> Self {
        Self::Direct {
            program: zfs.to_string(),
            args: vec!["destroy".to_string(), "-d".to_string(), snapshot.to_string()],
        }
    }

    /// Run the command, failing on a non-zero exit status
    pub fn run(&self) -> Result<()> {
        let output = match self {
            Self::Direct { program, args } => Command::new(program).args(args).output()?,
            Self::Shell { script } => Command::new("sh").arg("-c").arg(script).output()?,
        };
        if !output.status.success() {
            return Err(ZfsToolsError::CommandFailed {
                command: self.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SnapshotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { program, args } => write!(f, "{} {}", program, args.join(" ")),
            Self::Shell { script } => f.write_str(script),
        }
    }
}

/// Executor that shells out to `zfs`
#[derive(Debug, Clone)]
pub struct ZfsExecutor {
    tools: ToolPaths,
    dry_run: bool,
    verbose: bool,
    debug: bool,
}

impl ZfsExecutor {
    pub fn new(tools: ToolPaths, dry_run: bool, verbose: bool) -> Self {
        Self {
            tools,
            dry_run,
            verbose,
            debug: false,
        }
    }

    /// Executor honoring the run flags of `config`
    pub fn for_config(tools: ToolPaths, config: &Config) -> Self {
        Self::new(tools, config.dry_run, config.verbose).with_debug(config.debug)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Whether each command is echoed to stdout before it runs
    pub fn echoes_commands(&self) -> bool {
        self.verbose || self.debug || self.dry_run
    }

    fn zfs(&self) -> String {
        self.tools.zfs.to_string_lossy().into_owned()
    }

    fn execute(&self, command: &SnapshotCommand) -> Result<()> {
        if self.echoes_commands() {
            println!("{}", command);
        }
        log::debug!("{}", command);
        if self.dry_run {
            return Ok(());
        }
        command.run()
    }
}

impl SnapshotExecutor for ZfsExecutor {
    fn create(
        &self,
        targets: &[String],
        recursive: bool,
        database: Option<DatabaseKind>,
    ) -> Result<()> {
        validate_targets(targets)?;
        let command = SnapshotCommand::create(&self.zfs(), targets, recursive, database);
        self.execute(&command)
    }

    fn destroy(&self, snapshot: &str) -> Result<()> {
        validate_targets(std::slice::from_ref(&snapshot.to_string()))?;
        let command = SnapshotCommand::destroy(&self.zfs(), snapshot);
        self.execute(&command)
    }
}

/// Every target must name a snapshot, never a bare dataset
pub fn validate_targets(targets: &[String]) -> Result<()> {
    if targets.is_empty() {
        return Err(ZfsToolsError::EmptySnapshotName);
    }
    for target in targets {
        match target.split_once('@') {
            Some((dataset, suffix)) if !dataset.is_empty() && !suffix.is_empty() => {}
            _ => return Err(ZfsToolsError::invalid_snapshot_name(target.as_str())),
        }
    }
    Ok(())
}
