use crate::{Cluster, LifecycleStatus};

/// Update priority tier. Variants are declared lowest first so the derived
/// ordering matches selection order: a greater value is always picked first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdatePriority {
    Normal,
    DecommissionRequested,
    AlreadyUpdating,
}

impl UpdatePriority {
    pub fn of(cluster: &Cluster) -> Self {
        if cluster.status.is_updating() {
            return Self::AlreadyUpdating;
        }
        match cluster.lifecycle_status {
            LifecycleStatus::DecommissionRequested => Self::DecommissionRequested,
            LifecycleStatus::Active | LifecycleStatus::Decommissioned => Self::Normal,
        }
    }
}
