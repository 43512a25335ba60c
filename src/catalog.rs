//! Read-only view of the volume manager: datasets, snapshots, pool features

use crate::config::ToolPaths;
use crate::error::{Result, ZfsToolsError};
use crate::model::{Dataset, Pool, Snapshot};
use crate::FALLBACK_ARG_MAX;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

/// Source of dataset and snapshot listings.
///
/// Implementations must return datasets sorted by name ascending and
/// snapshots sorted by name descending (newest first).
pub trait VolumeCatalog: Send + Sync {
    /// Filesystems and volumes under `pool` (all pools when `None`), with
    /// `type` plus the requested `properties`
    fn list_datasets(&self, pool: Option<&str>, properties: &[String]) -> Result<Vec<Dataset>>;

    /// Snapshots of `dataset`, or of every dataset when `None`
    fn list_snapshots(&self, dataset: Option<&str>, recursive: bool) -> Result<Vec<Snapshot>>;

    /// Current `used` value of a snapshot in bytes
    fn snapshot_used(&self, snapshot: &str) -> Result<i64>;

    /// Whether several snapshot targets can be created in one call
    fn supports_batched_snapshots(&self) -> bool;

    /// Maximum combined argument length for one command
    fn command_length_limit(&self) -> usize;
}

/// Catalog backed by the `zfs`, `zpool` and `getconf` binaries
#[derive(Debug)]
pub struct ZfsCatalog {
    tools: ToolPaths,
    batched: OnceLock<bool>,
    arg_max: OnceLock<usize>,
}

impl ZfsCatalog {
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            batched: OnceLock::new(),
            arg_max: OnceLock::new(),
        }
    }

    /// Pool properties from `zpool get`; all properties when none are given
    pub fn list_pools(&self, name: Option<&str>, properties: &[String]) -> Result<Vec<Pool>> {
        let properties = if properties.is_empty() {
            "all".to_string()
        } else {
            properties.join(",")
        };
        let mut args = vec![
            "get".to_string(),
            "-H".to_string(),
            "-p".to_string(),
            "-o".to_string(),
            "name,property,value".to_string(),
            properties,
        ];
        if let Some(name) = name {
            args.push(name.to_string());
        }

        let output = run_tool(&self.tools.zpool, &args)?;
        Ok(parse_pool_properties(&output))
    }

    fn probe_batched_snapshots(&self) -> bool {
        match self.list_pools(None, &["feature@bookmarks".to_string()]) {
            Ok(pools) => pools.iter().any(|pool| {
                matches!(
                    pool.properties.get("feature@bookmarks").map(String::as_str),
                    Some("enabled") | Some("active")
                )
            }),
            Err(e) => {
                log::debug!("Bookmark feature probe failed, assuming no batching: {}", e);
                false
            }
        }
    }

    fn probe_arg_max(&self) -> Result<usize> {
        let output = run_tool(&self.tools.getconf, &["ARG_MAX".to_string()])?;
        let value = output
            .trim()
            .parse::<usize>()
            .with_context(|| format!("unexpected ARG_MAX value '{}'", output.trim()))?;
        Ok(value)
    }
}

impl Default for ZfsCatalog {
    fn default() -> Self {
        Self::new(ToolPaths::from_env())
    }
}

impl VolumeCatalog for ZfsCatalog {
    fn list_datasets(&self, pool: Option<&str>, properties: &[String]) -> Result<Vec<Dataset>> {
        let mut columns = vec!["name".to_string(), "type".to_string()];
        columns.extend(properties.iter().cloned());

        let mut args = vec![
            "list".to_string(),
            "-H".to_string(),
            "-t".to_string(),
            "filesystem,volume".to_string(),
            "-o".to_string(),
            columns.join(","),
            "-s".to_string(),
            "name".to_string(),
        ];
        if let Some(pool) = pool {
            args.push("-r".to_string());
            args.push(pool.to_string());
        }

        let output = run_tool(&self.tools.zfs, &args)?;
        let mut datasets = parse_dataset_list(&output, properties);
        datasets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(datasets)
    }

    fn list_snapshots(&self, dataset: Option<&str>, recursive: bool) -> Result<Vec<Snapshot>> {
        let mut args = vec!["list".to_string()];
        if dataset.is_some() && !recursive {
            args.push("-d".to_string());
            args.push("1".to_string());
        }
        if recursive {
            args.push("-r".to_string());
        }
        args.extend(
            ["-H", "-p", "-t", "snapshot", "-o", "name,used", "-S", "name"]
                .iter()
                .map(|s| s.to_string()),
        );
        if let Some(dataset) = dataset {
            args.push(dataset.to_string());
        }

        let output = run_tool(&self.tools.zfs, &args)?;
        let mut snapshots = parse_snapshot_list(&output);
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    fn snapshot_used(&self, snapshot: &str) -> Result<i64> {
        let args = ["get", "-Hp", "-o", "value", "used", snapshot].map(String::from);
        let output = run_tool(&self.tools.zfs, &args)?;
        output.trim().parse::<i64>().map_err(|_| {
            ZfsToolsError::parse(format!(
                "unexpected used value '{}' for {}",
                output.trim(),
                snapshot
            ))
        })
    }

    fn supports_batched_snapshots(&self) -> bool {
        *self.batched.get_or_init(|| self.probe_batched_snapshots())
    }

    fn command_length_limit(&self) -> usize {
        *self.arg_max.get_or_init(|| match self.probe_arg_max() {
            Ok(value) => value,
            Err(e) => {
                log::debug!("ARG_MAX unavailable, using {}: {}", FALLBACK_ARG_MAX, e);
                FALLBACK_ARG_MAX
            }
        })
    }
}

/// Run an external tool and return its stdout
pub fn run_tool(program: &Path, args: &[String]) -> Result<String> {
    let command_line = format!("{} {}", program.display(), args.join(" "));
    log::debug!("{}", command_line);

    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(ZfsToolsError::CommandFailed {
            command: command_line,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8(output.stdout)?)
}

/// Parse `zfs list -H -o name,type,<properties>` output
pub fn parse_dataset_list(output: &str, properties: &[String]) -> Vec<Dataset> {
    let mut datasets = Vec::new();
    for line in output.lines() {
        let values: Vec<&str> = line.split('\t').collect();
        if values.len() < 2 {
            continue;
        }

        let mut dataset = Dataset::new(values[0]).with_property("type", values[1]);
        for (property, value) in properties.iter().zip(values.iter().skip(2)) {
            if *value == "-" {
                continue;
            }
            dataset = dataset.with_property(property.as_str(), *value);
        }
        datasets.push(dataset);
    }
    datasets
}

/// Parse `zfs list -H -p -o name,used` output, skipping malformed lines
pub fn parse_snapshot_list(output: &str) -> Vec<Snapshot> {
    output
        .lines()
        .filter_map(|line| {
            let (name, used) = line.split_once('\t')?;
            let used = used.trim().parse::<i64>().ok()?;
            Some(Snapshot::with_used(name, used))
        })
        .collect()
}

/// Parse `zpool get -H -p -o name,property,value` output into pools sorted by name
pub fn parse_pool_properties(output: &str) -> Vec<Pool> {
    let mut pools: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for line in output.lines() {
        let values: Vec<&str> = line.split('\t').collect();
        if values.len() < 3 {
            continue;
        }
        pools
            .entry(values[0].to_string())
            .or_default()
            .insert(values[1].to_string(), values[2].to_string());
    }
    pools
        .into_iter()
        .map(|(name, properties)| Pool { name, properties })
        .collect()
}
