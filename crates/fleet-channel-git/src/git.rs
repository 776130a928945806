use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use fleet_channel::{ChannelError, MirrorBackend, Revision};
use tracing::debug;

/// [`MirrorBackend`] driving the `git` binary, one process per operation.
#[derive(Clone, Debug, Default)]
pub struct GitCli {
    pub ssh_private_key_file: Option<PathBuf>,
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ssh_key(key: impl Into<PathBuf>) -> Self {
        Self { ssh_private_key_file: Some(key.into()) }
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(key) = &self.ssh_private_key_file {
            cmd.env(
                "GIT_SSH_COMMAND",
                format!("ssh -i {} -o StrictHostKeyChecking=no", shell_quote(&key.to_string_lossy())),
            );
        }
        cmd
    }

    fn run<I, S>(&self, args: I) -> Result<String, ChannelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command = format!(
            "git {}",
            args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );
        debug!(%command, "running");

        let out = self
            .command(&args)
            .output()
            .map_err(|source| ChannelError::Spawn { command: command.clone(), source })?;
        if !out.status.success() {
            return Err(ChannelError::Command {
                command,
                status: out.status,
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

/// git hands `GIT_SSH_COMMAND` to `sh -c`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl MirrorBackend for GitCli {
    fn refresh(&self, remote: &str, mirror: &Path) -> Result<(), ChannelError> {
        match std::fs::metadata(mirror) {
            Ok(_) => {
                self.run([
                    OsStr::new("--git-dir"),
                    mirror.as_os_str(),
                    OsStr::new("remote"),
                    OsStr::new("update"),
                    OsStr::new("--prune"),
                ])?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.run([OsStr::new("clone"), OsStr::new("--mirror"), OsStr::new(remote), mirror.as_os_str()])?;
            }
            Err(e) => return Err(ChannelError::io(mirror, e)),
        }
        Ok(())
    }

    fn checkout_at(&self, mirror: &Path, dest: &Path, channel: &str) -> Result<(), ChannelError> {
        let source = format!("file://{}", mirror.display());
        self.run([OsStr::new("clone"), OsStr::new("--quiet"), OsStr::new(&source), dest.as_os_str()])?;
        self.run([
            OsStr::new("-C"),
            dest.as_os_str(),
            OsStr::new("checkout"),
            OsStr::new("--quiet"),
            OsStr::new(channel),
        ])?;
        Ok(())
    }

    fn resolve_revision(&self, checkout: &Path) -> Result<Revision, ChannelError> {
        self.run([OsStr::new("-C"), checkout.as_os_str(), OsStr::new("rev-parse"), OsStr::new("HEAD")])
    }
}
