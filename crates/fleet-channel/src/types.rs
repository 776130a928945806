use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Revision = String;

/// A private, revision-pinned checkout of one channel.
///
/// Owned by whoever received it from [`ConfigSource::get`] until handed back to
/// [`ConfigSource::delete`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub version: Revision,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not parse repository name from uri: {0}")]
    InvalidRepository(String),

    #[error("invalid channel name {0:?}")]
    InvalidChannel(String),

    #[error("failed to run {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed: {command} ({status})\nstderr:{stderr}")]
    Command {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("io error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChannelError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Hands out isolated configuration snapshots of named channels.
pub trait ConfigSource: Send + Sync {
    /// Bring the local mirror in sync with the remote. May block on network I/O.
    fn update(&self) -> Result<(), ChannelError>;

    /// Produce a fresh checkout of `channel`. Never shares a path with another snapshot.
    fn get(&self, channel: &str) -> Result<ConfigSnapshot, ChannelError>;

    /// Remove the snapshot's checkout. Already-removed snapshots are not an error.
    fn delete(&self, snapshot: ConfigSnapshot) -> Result<(), ChannelError>;
}

/// The version-control operations a mirrored source needs. Implementations
/// must allow concurrent `checkout_at`/`resolve_revision` calls against one
/// mirror; `refresh` is serialized by the caller.
pub trait MirrorBackend: Send + Sync {
    /// Create the mirror of `remote` at `mirror`, or fetch and prune it if present.
    fn refresh(&self, remote: &str, mirror: &Path) -> Result<(), ChannelError>;

    /// Clone `mirror` into the new directory `dest` and check out `channel`.
    fn checkout_at(&self, mirror: &Path, dest: &Path, channel: &str) -> Result<(), ChannelError>;

    /// Revision currently checked out in `checkout`.
    fn resolve_revision(&self, checkout: &Path) -> Result<Revision, ChannelError>;
}
