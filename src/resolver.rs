//! Collapse eligible datasets into single and recursive snapshot groups

use crate::catalog::VolumeCatalog;
use crate::classify::{classify_datasets, Classification};
use crate::config::Config;
use crate::error::Result;
use crate::model::{is_descendant, parent_of, DatabaseKind, Dataset};
use crate::SNAPSHOT_PROPERTY;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Resolver output: how each included dataset gets snapshotted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetGroups {
    /// Snapshotted one by one because an excluded descendant interrupts the subtree
    pub single: Vec<Dataset>,
    /// Topmost roots of fully included subtrees, snapshotted with `-r`
    pub recursive: Vec<Dataset>,
    pub included: Vec<Dataset>,
    pub excluded: Vec<Dataset>,
}

impl DatasetGroups {
    pub fn is_included(&self, name: &str) -> bool {
        self.included.iter().any(|d| d.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.recursive.is_empty()
    }
}

/// Groups classified datasets for snapshotting
#[derive(Debug)]
pub struct DatasetResolver {
    included: Vec<Dataset>,
    excluded: Vec<Dataset>,
}

impl DatasetResolver {
    pub fn new(classification: Classification) -> Self {
        Self {
            included: classification.included,
            excluded: classification.excluded,
        }
    }

    pub fn from_sets(included: Vec<Dataset>, excluded: Vec<Dataset>) -> Self {
        Self { included, excluded }
    }

    /// Split included datasets into single and recursive groups
    pub fn resolve(self) -> DatasetGroups {
        let mut ordered: Vec<&Dataset> = self.included.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));

        // Every dataset with an opinion, keyed by name
        let visible: BTreeMap<&str, &Dataset> = self
            .included
            .iter()
            .chain(self.excluded.iter())
            .map(|d| (d.name.as_str(), d))
            .collect();

        let mut single = Vec::new();
        let mut candidates = BTreeSet::new();
        for dataset in &ordered {
            let interrupted = self
                .excluded
                .iter()
                .any(|ex| is_descendant(&ex.name, &dataset.name));
            if interrupted {
                log::debug!("{}: excluded descendant, snapshotting singly", dataset.name);
                single.push((*dataset).clone());
            } else {
                candidates.insert(dataset.name.as_str());
            }
        }

        let mut recursive = Vec::new();
        for dataset in &ordered {
            if !candidates.contains(dataset.name.as_str()) {
                continue;
            }
            if let Some(root) = covering_ancestor(&dataset.name, &candidates) {
                log::debug!("{}: covered by recursive snapshot of {}", dataset.name, root);
                continue;
            }
            let mut root = (*dataset).clone();
            if let Some(kind) = descendant_database(&root.name, &visible) {
                root.database = Some(kind);
            }
            recursive.push(root);
        }

        DatasetGroups {
            single,
            recursive,
            included: self.included,
            excluded: self.excluded,
        }
    }
}

/// Nearest ancestor of `name` that is itself a recursive candidate
fn covering_ancestor<'a>(name: &str, candidates: &BTreeSet<&'a str>) -> Option<&'a str> {
    let mut current = parent_of(name);
    while let Some(parent) = current {
        if let Some(found) = candidates.get(parent) {
            return Some(*found);
        }
        current = parent_of(parent);
    }
    None
}

/// Database marker inherited from descendants of a recursive root.
///
/// Descendants are visited in name order and the last marked one wins; a
/// disagreement between descendants is logged.
fn descendant_database(root: &str, visible: &BTreeMap<&str, &Dataset>) -> Option<DatabaseKind> {
    let mut chosen: Option<(&str, DatabaseKind)> = None;
    for (name, dataset) in visible.iter() {
        if !is_descendant(name, root) {
            continue;
        }
        let Some(kind) = dataset.database else {
            continue;
        };
        if let Some((previous, previous_kind)) = chosen {
            if previous_kind != kind {
                log::warn!(
                    "{}: descendants disagree on database kind ({} is {}, {} is {}); using {}",
                    root,
                    previous,
                    previous_kind,
                    name,
                    kind,
                    kind
                );
            }
        }
        chosen = Some((*name, kind));
    }
    chosen.map(|(_, kind)| kind)
}

/// List datasets from the catalog, classify them and group them
pub fn find_eligible_datasets(
    catalog: &dyn VolumeCatalog,
    config: &Config,
    pool: Option<&str>,
) -> Result<DatasetGroups> {
    let datasets = catalog.list_datasets(pool, &config.catalog_properties())?;
    let classification =
        classify_datasets(&datasets, &config.interval_property(), SNAPSHOT_PROPERTY);
    Ok(DatasetResolver::new(classification).resolve())
}
