use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{repository_name, ChannelError, ConfigSnapshot, ConfigSource, MirrorBackend};

/// Config source backed by a local mirror of a remote repository.
///
/// `update` is the only writer of the mirror and is serialized. `get` clones
/// from the mirror into a directory nobody else uses, so it takes no lock.
pub struct MirroredSource<B> {
    backend: B,
    workdir: PathBuf,
    repository_url: String,
    repo_name: String,
    mirror_dir: PathBuf,
    refresh_lock: Mutex<()>,
}

impl<B: MirrorBackend> MirroredSource<B> {
    /// Fails on a repository URL without a usable name, before touching the filesystem.
    pub fn new(backend: B, workdir: impl AsRef<Path>, repository_url: impl Into<String>) -> Result<Self, ChannelError> {
        let repository_url = repository_url.into();
        let repo_name = repository_name(&repository_url)?;
        let workdir = std::path::absolute(workdir.as_ref()).map_err(|e| ChannelError::io(workdir.as_ref(), e))?;
        let mirror_dir = workdir.join(&repo_name);

        Ok(Self {
            backend,
            workdir,
            repository_url,
            repo_name,
            mirror_dir,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `{repo}_{channel}_{nanos}_{suffix}`; the random suffix covers coarse clocks.
    fn checkout_dir(&self, channel: &str) -> PathBuf {
        let channel = channel.replace(['/', '\\'], "-");
        loop {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default();
            let suffix = Uuid::new_v4().simple().to_string();
            let dir = self
                .workdir
                .join(format!("{}_{}_{}_{}", self.repo_name, channel, nanos, &suffix[..8]));
            if !dir.exists() {
                return dir;
            }
        }
    }
}

impl<B: MirrorBackend> ConfigSource for MirroredSource<B> {
    fn update(&self) -> Result<(), ChannelError> {
        let _guard = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);
        std::fs::create_dir_all(&self.workdir).map_err(|e| ChannelError::io(&self.workdir, e))?;
        self.backend.refresh(&self.repository_url, &self.mirror_dir)?;
        info!(repository = %self.repo_name, mirror = %self.mirror_dir.display(), "config mirror updated");
        Ok(())
    }

    fn get(&self, channel: &str) -> Result<ConfigSnapshot, ChannelError> {
        if channel.trim().is_empty() || channel.starts_with('-') {
            return Err(ChannelError::InvalidChannel(channel.to_string()));
        }

        let path = self.checkout_dir(channel);
        self.backend.checkout_at(&self.mirror_dir, &path, channel)?;
        let version = self.backend.resolve_revision(&path)?;
        debug!(channel, %version, path = %path.display(), "checked out config snapshot");

        Ok(ConfigSnapshot { version, path })
    }

    fn delete(&self, snapshot: ConfigSnapshot) -> Result<(), ChannelError> {
        match std::fs::remove_dir_all(&snapshot.path) {
            Ok(()) => {
                debug!(path = %snapshot.path.display(), "removed config snapshot");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChannelError::io(&snapshot.path, e)),
        }
    }
}
