use serde::{Deserialize, Serialize};

use crate::ClusterId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStatus {
    #[default]
    Active,
    DecommissionRequested,
    Decommissioned,
}

/// Version state reported by the provisioner for a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub next_version: String,
}

impl ClusterStatus {
    /// An update is underway when a next version is recorded that differs from the current one.
    pub fn is_updating(&self) -> bool {
        !self.next_version.is_empty() && self.next_version != self.current_version
    }
}

/// A cluster as reported by the inventory. The registry treats it as immutable data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub infrastructure_account: String,
    #[serde(default)]
    pub lifecycle_status: LifecycleStatus,
    /// Configuration channel (branch in the config repository) this cluster follows.
    pub channel: String,
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Cluster {
    pub fn new(id: impl Into<ClusterId>, infrastructure_account: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            infrastructure_account: infrastructure_account.into(),
            lifecycle_status: LifecycleStatus::Active,
            channel: channel.into(),
            status: ClusterStatus::default(),
        }
    }

    pub fn with_lifecycle_status(mut self, status: LifecycleStatus) -> Self {
        self.lifecycle_status = status;
        self
    }

    pub fn with_versions(mut self, current: impl Into<String>, next: impl Into<String>) -> Self {
        self.status = ClusterStatus {
            current_version: current.into(),
            next_version: next.into(),
        };
        self
    }
}
