//! Dataset, snapshot and pool value types

use crate::catalog::VolumeCatalog;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Live database hosted on a dataset that needs a consistency hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Mysql,
    Postgresql,
}

impl DatabaseKind {
    /// Map an auto-snapshot property value to a database kind
    pub fn from_property(value: &str) -> Option<Self> {
        match value {
            "mysql" => Some(Self::Mysql),
            "postgresql" => Some(Self::Postgresql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ZFS filesystem or volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseKind>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            database: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_database(mut self, kind: DatabaseKind) -> Self {
        self.database = Some(kind);
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_mounted(&self) -> bool {
        self.property("mounted") == Some("yes")
    }

    pub fn is_volume(&self) -> bool {
        self.property("type") == Some("volume")
    }

    /// Top-level pool this dataset lives in
    pub fn pool(&self) -> &str {
        pool_of(&self.name)
    }

    /// Parent path, `None` for a pool root
    pub fn parent_name(&self) -> Option<&str> {
        parent_of(&self.name)
    }

    /// True when `other` lies strictly below this dataset
    pub fn is_ancestor_of(&self, other: &str) -> bool {
        is_descendant(other, &self.name)
    }
}

/// First path component of a dataset or snapshot name
pub fn pool_of(name: &str) -> &str {
    let dataset = name.split('@').next().unwrap_or(name);
    dataset.split('/').next().unwrap_or(dataset)
}

/// Substring before the last `/`
pub fn parent_of(name: &str) -> Option<&str> {
    name.rfind('/').map(|idx| &name[..idx])
}

/// True when `name` is a strict path-descendant of `ancestor`
pub fn is_descendant(name: &str, ancestor: &str) -> bool {
    name.len() > ancestor.len() + 1
        && name.starts_with(ancestor)
        && name.as_bytes()[ancestor.len()] == b'/'
}

/// A point-in-time snapshot of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub name: String,
    /// Cached `used` property in bytes, `None` until fetched
    pub used: Option<i64>,
}

impl Snapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            used: None,
        }
    }

    pub fn with_used(name: impl Into<String>, used: i64) -> Self {
        Self {
            name: name.into(),
            used: Some(used),
        }
    }

    /// Owning dataset, `None` when the name carries no `@`
    pub fn dataset_name(&self) -> Option<&str> {
        self.name.split_once('@').map(|(dataset, _)| dataset)
    }

    /// Used bytes, re-fetched from the catalog when unknown or `stale`
    pub fn used_bytes(&mut self, catalog: &dyn VolumeCatalog, stale: bool) -> Result<i64> {
        match self.used {
            Some(used) if !stale => Ok(used),
            _ => {
                let used = catalog.snapshot_used(&self.name)?;
                self.used = Some(used);
                Ok(used)
            }
        }
    }

    pub fn is_zero_sized(&mut self, catalog: &dyn VolumeCatalog, stale: bool) -> Result<bool> {
        Ok(self.used_bytes(catalog, stale)? == 0)
    }
}

/// A storage pool and the properties requested for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}
