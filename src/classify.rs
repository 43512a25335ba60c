//! Auto-snapshot eligibility classification

use crate::model::{DatabaseKind, Dataset};
use std::collections::HashSet;

/// Datasets that opted in to, or explicitly out of, a snapshot policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub included: Vec<Dataset>,
    pub excluded: Vec<Dataset>,
    seen: HashSet<String>,
}

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `datasets` by `property`, skipping any already decided.
    ///
    /// Call once per override layer, most specific first. A dataset is
    /// included when the value is `true`, `mysql` or `postgresql` and it is
    /// either mounted or a volume; any other non-empty value excludes it.
    /// Datasets without a value stay unclassified.
    pub fn classify(&mut self, datasets: &[Dataset], property: &str) {
        for dataset in datasets {
            if self.seen.contains(&dataset.name) {
                continue;
            }

            let value = match dataset.property(property) {
                Some(value) if !value.is_empty() && value != "-" => value,
                _ => continue,
            };

            let opted_in = matches!(value, "true" | "mysql" | "postgresql");
            let eligible = dataset.is_mounted() || dataset.is_volume();

            self.seen.insert(dataset.name.clone());
            if opted_in && eligible {
                log::debug!("{}: included ({}={})", dataset.name, property, value);
                let mut included = dataset.clone();
                if let Some(kind) = DatabaseKind::from_property(value) {
                    included.database = Some(kind);
                }
                self.included.push(included);
            } else {
                log::debug!("{}: excluded ({}={})", dataset.name, property, value);
                self.excluded.push(dataset.clone());
            }
        }
    }

    pub fn is_classified(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.included.iter().any(|d| d.name == name)
    }
}

/// Apply the interval-specific layer, then the general layer
pub fn classify_datasets(
    datasets: &[Dataset],
    interval_property: &str,
    general_property: &str,
) -> Classification {
    let mut classification = Classification::new();
    classification.classify(datasets, interval_property);
    classification.classify(datasets, general_property);
    classification
}
