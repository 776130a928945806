use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fleet_channel::MirroredSource;
use fleet_channel_git::GitCli;
use fleet_registry::{IncludeExcludeFilter, DEFAULT_EXCLUDE, DEFAULT_INCLUDE};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub channel: ChannelConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub repository_url: String,
    pub workdir: String,
    #[serde(default)]
    pub ssh_private_key_file: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub include: String,
    pub exclude: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE.to_string(),
            exclude: DEFAULT_EXCLUDE.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub workers: usize,
    pub interval_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { workers: 1, interval_secs: 60 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// argv run once per selected cluster, inside the config snapshot.
    pub command: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { command: vec!["true".to_string()] }
    }
}

impl Config {
    pub fn default_for(repository_url: &str) -> Self {
        Self {
            channel: ChannelConfig {
                repository_url: repository_url.to_string(),
                workdir: "~/.fleet/work".to_string(),
                ssh_private_key_file: None,
            },
            accounts: AccountsConfig::default(),
            controller: ControllerConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn workdir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.channel.workdir).to_string())
    }

    pub fn ssh_private_key_file(&self) -> Option<PathBuf> {
        self.channel
            .ssh_private_key_file
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.controller.interval_secs)
    }

    pub fn account_filter(&self) -> Result<IncludeExcludeFilter> {
        IncludeExcludeFilter::new(&self.accounts.include, &self.accounts.exclude).context("account filter")
    }

    pub fn config_source(&self) -> Result<MirroredSource<GitCli>> {
        fleet_channel_git::git_source(self.workdir(), self.channel.repository_url.clone(), self.ssh_private_key_file())
            .with_context(|| format!("config repository {}", self.channel.repository_url))
    }
}
