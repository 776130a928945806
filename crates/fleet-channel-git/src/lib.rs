pub mod git;

pub use git::*;

use std::path::Path;

use fleet_channel::{ChannelError, MirroredSource};

/// Config source mirroring `repository_url` into `workdir` with the git CLI.
pub fn git_source(
    workdir: impl AsRef<Path>,
    repository_url: impl Into<String>,
    ssh_private_key_file: Option<std::path::PathBuf>,
) -> Result<MirroredSource<GitCli>, ChannelError> {
    let git = match ssh_private_key_file {
        Some(key) => GitCli::with_ssh_key(key),
        None => GitCli::new(),
    };
    MirroredSource::new(git, workdir, repository_url)
}
