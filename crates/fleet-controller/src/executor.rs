use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use fleet_channel::ConfigSnapshot;
use fleet_core::Cluster;

/// Applies a configuration snapshot to a cluster.
pub trait UpdateExecutor: Send + Sync {
    fn update(&self, cluster: &Cluster, config: &ConfigSnapshot) -> Result<()>;
}

/// Runs an external command inside the snapshot directory.
///
/// The command sees `CLUSTER_ID`, `CLUSTER_ACCOUNT`, `CLUSTER_CHANNEL`,
/// `CONFIG_PATH` and `CONFIG_VERSION` in its environment.
#[derive(Clone, Debug)]
pub struct CommandExecutor {
    argv: Vec<String>,
}

impl CommandExecutor {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            bail!("executor command is empty");
        }
        Ok(Self { argv })
    }
}

impl UpdateExecutor for CommandExecutor {
    fn update(&self, cluster: &Cluster, config: &ConfigSnapshot) -> Result<()> {
        let out = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .current_dir(&config.path)
            .env("CLUSTER_ID", cluster.id.as_str())
            .env("CLUSTER_ACCOUNT", &cluster.infrastructure_account)
            .env("CLUSTER_CHANNEL", &cluster.channel)
            .env("CONFIG_PATH", &config.path)
            .env("CONFIG_VERSION", &config.version)
            .output()
            .with_context(|| format!("run {:?}", self.argv))?;
        if !out.status.success() {
            return Err(anyhow!(
                "command failed: {:?} ({})\nstdout:{}\nstderr:{}",
                self.argv,
                out.status,
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot(dir: &std::path::Path) -> ConfigSnapshot {
        ConfigSnapshot { version: "abc123".into(), path: dir.to_path_buf() }
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandExecutor::new(vec![]).is_err());
    }

    #[test]
    fn exports_cluster_and_config_env() {
        let dir = tempdir().unwrap();
        let exec = CommandExecutor::new(vec![
            "sh".into(),
            "-c".into(),
            "echo \"$CLUSTER_ID $CLUSTER_CHANNEL $CONFIG_VERSION\" > out.txt".into(),
        ])
        .unwrap();
        exec.update(&Cluster::new("kube-1", "aws:1", "beta"), &snapshot(dir.path())).unwrap();

        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "kube-1 beta abc123");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let dir = tempdir().unwrap();
        let exec = CommandExecutor::new(vec!["false".into()]).unwrap();
        assert!(exec.update(&Cluster::new("kube-1", "aws:1", "beta"), &snapshot(dir.path())).is_err());
    }
}
