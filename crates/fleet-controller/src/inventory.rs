use std::path::PathBuf;

use anyhow::{Context, Result};
use fleet_core::Cluster;

/// Source of the authoritative cluster list.
pub trait Inventory: Send + Sync {
    fn list_clusters(&self) -> Result<Vec<Cluster>>;
}

/// Reads the cluster list from a YAML file on every call.
#[derive(Clone, Debug)]
pub struct FileInventory {
    pub path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Inventory for FileInventory {
    fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let s = std::fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path.display()))?;
        let clusters = serde_yaml::from_str(&s).with_context(|| format!("parse {}", self.path.display()))?;
        Ok(clusters)
    }
}
