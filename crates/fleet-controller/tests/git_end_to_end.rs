use std::sync::{Arc, Mutex};

use anyhow::Result;
use fleet_channel::contract::{commit_to_channel, init_config_repo};
use fleet_channel::ConfigSnapshot;
use fleet_controller::{Config, Controller, FileInventory, UpdateExecutor};
use fleet_core::Cluster;
use fleet_registry::ClusterRegistry;
use tempfile::tempdir;

#[derive(Clone, Default)]
struct CaptureExecutor(Arc<Mutex<Vec<(String, String, String)>>>);

impl UpdateExecutor for CaptureExecutor {
    fn update(&self, cluster: &Cluster, config: &ConfigSnapshot) -> Result<()> {
        let contents = std::fs::read_to_string(config.path.join("config.yaml"))?;
        self.0
            .lock()
            .unwrap()
            .push((cluster.id.to_string(), config.version.clone(), contents));
        Ok(())
    }
}

#[test]
fn clusters_get_their_channel_snapshot() {
    let dir = tempdir().unwrap();
    let remote = dir.path().join("remote").join("configs");
    init_config_repo(&remote, &["stable", "beta"]).unwrap();
    let beta_rev = commit_to_channel(&remote, "beta", "config.yaml", "version: beta\n").unwrap();

    let inventory = dir.path().join("clusters.yaml");
    std::fs::write(
        &inventory,
        "- id: prod\n  infrastructure_account: aws:prod\n  channel: stable\n\
         - id: test\n  infrastructure_account: aws:test\n  channel: beta\n\
         - id: other\n  infrastructure_account: gcp:1\n  channel: beta\n",
    )
    .unwrap();

    let mut cfg = Config::default_for(remote.to_str().unwrap());
    cfg.channel.workdir = dir.path().join("work").to_str().unwrap().to_string();
    cfg.accounts.include = "^aws:".to_string();

    let source = cfg.config_source().unwrap();
    let workdir = source.workdir().to_path_buf();
    let registry = ClusterRegistry::new(cfg.account_filter().unwrap());
    let executor = CaptureExecutor::default();
    let controller = Controller::new(registry, FileInventory::new(&inventory), source, executor.clone());

    let mut updated: Vec<String> = controller.run_once().unwrap().iter().map(|id| id.to_string()).collect();
    updated.sort();
    assert_eq!(updated, vec!["prod", "test"]);

    let seen = executor.0.lock().unwrap();
    let test = seen.iter().find(|(id, _, _)| id == "test").unwrap();
    assert_eq!(test.1, beta_rev);
    assert_eq!(test.2, "version: beta\n");
    let prod = seen.iter().find(|(id, _, _)| id == "prod").unwrap();
    assert_eq!(prod.2, "version: 0\n");

    // only the mirror is left behind
    let left: Vec<_> = std::fs::read_dir(&workdir).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(left, vec![std::ffi::OsString::from("configs")]);
}
