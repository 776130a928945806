use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fleet_channel::ConfigSource;
use fleet_core::{Cluster, ClusterId};
use fleet_registry::ClusterRegistry;
use tracing::{info, trace, warn};

use crate::{Inventory, UpdateExecutor};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Drives the refresh -> select -> checkout -> update -> release cycle.
pub struct Controller {
    registry: ClusterRegistry,
    inventory: Box<dyn Inventory>,
    config_source: Box<dyn ConfigSource>,
    executor: Box<dyn UpdateExecutor>,
    interval: Duration,
}

impl Controller {
    pub fn new(
        registry: ClusterRegistry,
        inventory: impl Inventory + 'static,
        config_source: impl ConfigSource + 'static,
        executor: impl UpdateExecutor + 'static,
    ) -> Self {
        Self {
            registry,
            inventory: Box::new(inventory),
            config_source: Box::new(config_source),
            executor: Box::new(executor),
            interval: Duration::from_secs(60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn registry(&self) -> &ClusterRegistry {
        &self.registry
    }

    /// Pull the inventory into the registry, then update the config mirror.
    pub fn refresh(&self) -> Result<()> {
        let clusters = self.inventory.list_clusters().context("list clusters")?;
        self.registry.ingest(clusters);
        self.config_source.update().context("update config source")?;
        Ok(())
    }

    /// Update one cluster, if any is selectable.
    ///
    /// The selected cluster is always released back to the registry, and its
    /// snapshot always deleted, whether or not the update succeeded.
    pub fn process_next(&self) -> Result<Option<ClusterId>> {
        match self.registry.select_next() {
            Some(cluster) => self.process(&cluster).map(Some),
            None => Ok(None),
        }
    }

    /// `cluster` must have been returned by `select_next`; it is released here.
    fn process(&self, cluster: &Cluster) -> Result<ClusterId> {
        info!(cluster = %cluster.id, channel = %cluster.channel, "updating cluster");
        let result = self.update_cluster(cluster);
        self.registry.cluster_processed(&cluster.id);

        match result {
            Ok(version) => {
                info!(cluster = %cluster.id, %version, "cluster updated");
                Ok(cluster.id.clone())
            }
            Err(e) => {
                warn!(cluster = %cluster.id, "cluster update failed: {e:#}");
                Err(e)
            }
        }
    }

    fn update_cluster(&self, cluster: &Cluster) -> Result<String> {
        let snapshot = self
            .config_source
            .get(&cluster.channel)
            .with_context(|| format!("checkout channel {} for {}", cluster.channel, cluster.id))?;
        let version = snapshot.version.clone();
        let result = self.executor.update(cluster, &snapshot);
        if let Err(e) = self.config_source.delete(snapshot) {
            warn!(cluster = %cluster.id, "failed to remove config snapshot: {e}");
        }
        result.with_context(|| format!("update {}", cluster.id))?;
        Ok(version)
    }

    /// Refresh once, then give every tracked cluster one update attempt in
    /// selection order. Returns the clusters that were updated successfully.
    pub fn run_once(&self) -> Result<Vec<ClusterId>> {
        self.refresh()?;
        // claim the whole fleet up front so a cluster that stays in a high
        // tier cannot be picked twice
        let batch: Vec<_> = std::iter::from_fn(|| self.registry.select_next()).collect();
        Ok(batch.iter().filter_map(|cluster| self.process(cluster).ok()).collect())
    }

    /// Run one refresher and `workers` update loops until `shutdown` is set.
    ///
    /// Each worker attempts at most one update per interval. An update in
    /// flight when shutdown is requested runs to completion and is released.
    pub fn run(&self, workers: usize, shutdown: &AtomicBool) {
        thread::scope(|s| {
            s.spawn(|| loop {
                if let Err(e) = self.refresh() {
                    warn!("refresh failed: {e:#}");
                }
                if !self.idle(shutdown) {
                    break;
                }
            });

            for worker in 0..workers.max(1) {
                s.spawn(move || {
                    while self.idle(shutdown) {
                        if let Ok(None) = self.process_next() {
                            trace!(worker, "nothing to update");
                        }
                    }
                });
            }
        });
    }

    /// Sleep for one interval; false when shutdown was requested meanwhile.
    fn idle(&self, shutdown: &AtomicBool) -> bool {
        let deadline = Instant::now() + self.interval;
        while Instant::now() < deadline {
            if shutdown.load(Ordering::SeqCst) {
                return false;
            }
            thread::sleep(SHUTDOWN_POLL.min(self.interval));
        }
        !shutdown.load(Ordering::SeqCst)
    }
}
