//! Output formatting utilities

use crate::error::Result;
use crate::model::Dataset;
use crate::resolver::DatasetGroups;
use crate::retention::CleanupReport;

/// Pretty printer for zfstools output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print how each eligible dataset will be snapshotted
    pub fn print_dataset_groups(interval: &str, groups: &DatasetGroups) {
        println!("Snapshot policy '{}'", interval);
        print_section("├─", "Recursive", &groups.recursive);
        print_section("├─", "Single", &groups.single);
        print_section("├─", "Included", &groups.included);
        print_section("└─", "Excluded", &groups.excluded);
    }

    /// Print a cleanup summary
    pub fn print_cleanup_report(report: &CleanupReport, dry_run: bool) {
        let verb = if dry_run { "Would destroy" } else { "Destroyed" };
        println!(
            "{} {} zero-sized and {} expired snapshot(s)",
            verb,
            report.zero_sized.len(),
            report.expired.len()
        );
    }
}

fn print_section(branch: &str, title: &str, datasets: &[Dataset]) {
    let indent = if branch == "└─" { "   " } else { "│  " };
    println!("{} {} ({})", branch, title, datasets.len());
    for (i, dataset) in datasets.iter().enumerate() {
        let prefix = if i == datasets.len() - 1 { "└─" } else { "├─" };
        match dataset.database {
            Some(kind) => println!("{}{} {} [{}]", indent, prefix, dataset.name, kind),
            None => println!("{}{} {}", indent, prefix, dataset.name),
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Dataset groups as JSON, listing names only
    pub fn format_dataset_groups(interval: &str, groups: &DatasetGroups) -> Result<String> {
        let names = |datasets: &[Dataset]| -> Vec<serde_json::Value> {
            datasets
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name,
                        "database": d.database,
                    })
                })
                .collect()
        };
        let json = serde_json::json!({
            "interval": interval,
            "recursive": names(&groups.recursive),
            "single": names(&groups.single),
            "included": names(&groups.included),
            "excluded": names(&groups.excluded),
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}
