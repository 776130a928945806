use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use fleet_core::{Cluster, ClusterId, LifecycleStatus, UpdatePriority};
use tracing::{debug, info};

use crate::AccountFilter;

#[derive(Debug)]
struct ClusterEntry {
    cluster: Arc<Cluster>,
    last_processed: SystemTime,
    processing: bool,
}

/// Live set of managed clusters plus the scheduling state needed to hand each
/// one to at most a single updater at a time.
///
/// All operations take the same lock and do no I/O while holding it.
pub struct ClusterRegistry {
    account_filter: Box<dyn AccountFilter>,
    entries: Mutex<HashMap<ClusterId, ClusterEntry>>,
}

impl ClusterRegistry {
    pub fn new(account_filter: impl AccountFilter + 'static) -> Self {
        Self {
            account_filter: Box::new(account_filter),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClusterId, ClusterEntry>> {
        // Critical sections never leave an entry half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconcile the registry against the inventory's current view.
    ///
    /// Entries that are being processed keep their old cluster data and are
    /// never evicted here, even when absent from `clusters`.
    pub fn ingest(&self, clusters: impl IntoIterator<Item = Cluster>) {
        let mut entries = self.lock();
        let mut seen = HashSet::new();

        for cluster in clusters {
            if cluster.lifecycle_status == LifecycleStatus::Decommissioned {
                debug!(cluster = %cluster.id, "cluster decommissioned");
                continue;
            }

            if !self.account_filter.allowed(&cluster.infrastructure_account) {
                info!(
                    cluster = %cluster.id,
                    account = %cluster.infrastructure_account,
                    "skipping cluster, infrastructure account does not match filter"
                );
                continue;
            }

            seen.insert(cluster.id.clone());

            match entries.get_mut(&cluster.id) {
                Some(existing) if existing.processing => {}
                Some(existing) => existing.cluster = Arc::new(cluster),
                None => {
                    entries.insert(
                        cluster.id.clone(),
                        ClusterEntry {
                            cluster: Arc::new(cluster),
                            last_processed: SystemTime::UNIX_EPOCH,
                            processing: false,
                        },
                    );
                }
            }
        }

        entries.retain(|id, entry| {
            let keep = entry.processing || seen.contains(id);
            if !keep {
                debug!(cluster = %id, "cluster no longer available, removing");
            }
            keep
        });
    }

    /// Pick the next cluster to update and mark it as processing.
    ///
    /// Higher [`UpdatePriority`] wins; within a tier the cluster processed
    /// longest ago wins. Returns `None` when every tracked cluster is taken.
    pub fn select_next(&self) -> Option<Arc<Cluster>> {
        let mut entries = self.lock();

        let mut best: Option<(UpdatePriority, &mut ClusterEntry)> = None;
        for entry in entries.values_mut().filter(|e| !e.processing) {
            let priority = UpdatePriority::of(&entry.cluster);
            let better = match &best {
                None => true,
                Some((best_priority, best_entry)) => {
                    priority > *best_priority
                        || (priority == *best_priority && entry.last_processed < best_entry.last_processed)
                }
            };
            if better {
                best = Some((priority, entry));
            }
        }

        let (priority, entry) = best?;
        entry.processing = true;
        debug!(cluster = %entry.cluster.id, ?priority, "selected cluster");
        Some(Arc::clone(&entry.cluster))
    }

    /// Release a cluster returned by [`select_next`](Self::select_next).
    ///
    /// Must be called exactly once per selection, whatever the update outcome.
    /// Unknown ids are ignored.
    pub fn cluster_processed(&self, id: &ClusterId) {
        self.cluster_processed_at(id, SystemTime::now());
    }

    pub(crate) fn cluster_processed_at(&self, id: &ClusterId, at: SystemTime) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(id) {
            entry.processing = false;
            entry.last_processed = entry.last_processed.max(at);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: &ClusterId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn is_processing(&self, id: &ClusterId) -> bool {
        self.lock().get(id).is_some_and(|e| e.processing)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::IncludeExcludeFilter;

    fn registry() -> ClusterRegistry {
        ClusterRegistry::new(IncludeExcludeFilter::default())
    }

    fn cluster(id: &str) -> Cluster {
        Cluster::new(id, "a1", "stable")
    }

    fn id(s: &str) -> ClusterId {
        ClusterId::new(s)
    }

    #[test]
    fn select_process_select_cycle() {
        let reg = ClusterRegistry::new(|account: &str| account == "a1");
        reg.ingest(vec![cluster("x")]);

        let picked = reg.select_next().unwrap();
        assert_eq!(picked.id, id("x"));
        assert!(reg.is_processing(&id("x")));
        assert!(reg.select_next().is_none());

        reg.cluster_processed(&id("x"));
        assert!(!reg.is_processing(&id("x")));
        assert_eq!(reg.select_next().unwrap().id, id("x"));
    }

    #[test]
    fn empty_registry_selects_nothing() {
        assert!(registry().select_next().is_none());
    }

    #[test]
    fn priority_beats_insertion_order_and_recency() {
        let reg = registry();
        reg.ingest(vec![
            cluster("normal"),
            cluster("decom").with_lifecycle_status(LifecycleStatus::DecommissionRequested),
            cluster("updating").with_versions("v1", "v2"),
        ]);
        // give the higher tiers a more recent processing time than the normal one
        let now = SystemTime::now();
        reg.cluster_processed_at(&id("updating"), now);
        reg.cluster_processed_at(&id("decom"), now);

        let order: Vec<_> = std::iter::from_fn(|| reg.select_next()).map(|c| c.id.clone()).collect();
        assert_eq!(order, vec![id("updating"), id("decom"), id("normal")]);
    }

    #[test]
    fn oldest_processed_wins_within_tier() {
        let reg = registry();
        reg.ingest(vec![cluster("a"), cluster("b")]);
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t2 = SystemTime::UNIX_EPOCH + Duration::from_secs(200);
        reg.cluster_processed_at(&id("b"), t1);
        reg.cluster_processed_at(&id("a"), t2);

        assert_eq!(reg.select_next().unwrap().id, id("b"));
        assert_eq!(reg.select_next().unwrap().id, id("a"));
    }

    #[test]
    fn round_robin_across_completions() {
        let reg = registry();
        reg.ingest(vec![cluster("a"), cluster("b"), cluster("c")]);
        let mut clock = SystemTime::UNIX_EPOCH;
        let mut seen = Vec::new();
        for _ in 0..6 {
            let picked = reg.select_next().unwrap();
            clock += Duration::from_secs(1);
            reg.cluster_processed_at(&picked.id, clock);
            seen.push(picked.id.clone());
        }
        // the second round repeats the first
        assert_eq!(seen[..3], seen[3..]);
        let mut first: Vec<_> = seen[..3].to_vec();
        first.sort();
        assert_eq!(first, vec![id("a"), id("b"), id("c")]);
    }

    #[test]
    fn last_processed_never_moves_backwards() {
        let reg = registry();
        reg.ingest(vec![cluster("a"), cluster("b")]);
        let late = SystemTime::UNIX_EPOCH + Duration::from_secs(500);
        reg.cluster_processed_at(&id("a"), late);
        reg.cluster_processed_at(&id("a"), SystemTime::UNIX_EPOCH + Duration::from_secs(10));
        reg.cluster_processed_at(&id("b"), SystemTime::UNIX_EPOCH + Duration::from_secs(100));

        assert_eq!(reg.select_next().unwrap().id, id("b"));
    }

    #[test]
    fn processing_entry_is_retained_when_absent() {
        let reg = registry();
        reg.ingest(vec![cluster("x"), cluster("y")]);
        let picked = reg.select_next().unwrap();
        let other = if picked.id == id("x") { id("y") } else { id("x") };

        reg.ingest(Vec::new());
        assert!(reg.contains(&picked.id));
        assert!(!reg.contains(&other));
        assert!(reg.select_next().is_none());

        reg.cluster_processed(&picked.id);
        assert!(reg.contains(&picked.id));
        reg.ingest(Vec::new());
        assert!(reg.is_empty());
    }

    #[test]
    fn processing_entry_keeps_stale_data() {
        let reg = registry();
        reg.ingest(vec![cluster("x")]);
        let picked = reg.select_next().unwrap();
        reg.ingest(vec![cluster("x").with_versions("v1", "v2")]);
        reg.cluster_processed(&picked.id);

        let again = reg.select_next().unwrap();
        assert!(!again.status.is_updating());
    }

    #[test]
    fn idle_entry_is_refreshed() {
        let reg = registry();
        reg.ingest(vec![cluster("x")]);
        reg.ingest(vec![cluster("x").with_versions("v1", "v2")]);
        assert!(reg.select_next().unwrap().status.is_updating());
    }

    #[test]
    fn decommissioned_clusters_are_never_tracked() {
        let reg = registry();
        reg.ingest(vec![cluster("x"), cluster("y")]);
        assert_eq!(reg.len(), 2);

        reg.ingest(vec![
            cluster("x").with_lifecycle_status(LifecycleStatus::Decommissioned),
            cluster("y"),
        ]);
        assert!(!reg.contains(&id("x")));
        assert!(reg.contains(&id("y")));

        let fresh = registry();
        fresh.ingest(vec![cluster("z").with_lifecycle_status(LifecycleStatus::Decommissioned)]);
        assert!(fresh.is_empty());
    }

    #[test]
    fn filtered_accounts_are_dropped() {
        let reg = ClusterRegistry::new(IncludeExcludeFilter::new(".*", "^blocked$").unwrap());
        reg.ingest(vec![
            Cluster::new("x", "blocked", "stable"),
            Cluster::new("y", "open", "stable"),
        ]);
        assert!(!reg.contains(&id("x")));
        assert!(reg.contains(&id("y")));
    }

    #[test]
    fn duplicate_ids_yield_one_entry() {
        let reg = registry();
        reg.ingest(vec![cluster("x"), cluster("x").with_versions("v1", "v2")]);
        assert_eq!(reg.len(), 1);
        assert!(reg.select_next().unwrap().status.is_updating());
    }

    #[test]
    fn processed_unknown_id_is_noop() {
        let reg = registry();
        reg.cluster_processed(&id("ghost"));
        assert!(reg.is_empty());
    }
}
