use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, ensure, Context, Result};

use crate::ConfigSource;

/// Shared behaviour every config source must show. `advance` moves `channel`
/// forward in the remote by one revision.
pub fn run_config_source_contract(
    source: &dyn ConfigSource,
    channel: &str,
    advance: &dyn Fn() -> Result<()>,
) -> Result<()> {
    source.update().context("initial update")?;

    let a = source.get(channel).context("first get")?;
    let b = source.get(channel).context("second get")?;
    ensure!(a.path != b.path, "snapshots share a path: {}", a.path.display());
    ensure!(a.version == b.version, "same upstream state resolved to {} and {}", a.version, b.version);
    ensure!(a.path.is_dir() && b.path.is_dir(), "snapshot directories missing");

    advance().context("advance channel")?;
    // the mirror only moves on update
    let stale = source.get(channel).context("get before update")?;
    ensure!(stale.version == a.version, "get observed upstream without update");
    source.update().context("second update")?;

    let c = source.get(channel).context("get after advance")?;
    ensure!(c.version != a.version, "channel advanced but version stayed {}", a.version);
    ensure!(a.path.is_dir(), "older snapshot disturbed by later checkout");

    source.delete(a.clone()).context("delete")?;
    ensure!(!a.path.exists(), "snapshot still present after delete");
    source.delete(a).context("second delete")?;

    std::fs::remove_dir_all(&b.path)?;
    source.delete(b).context("delete after external removal")?;

    source.delete(stale)?;
    source.delete(c)?;
    Ok(())
}

/// Initialize a config repository fixture with one commit on `main` and a
/// branch per entry in `channels`.
pub fn init_config_repo(dir: &Path, channels: &[&str]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    git(dir, &["init"])?;
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    git(dir, &["config", "user.email", "fleet@example.com"])?;
    git(dir, &["config", "user.name", "fleet"])?;
    std::fs::write(dir.join("config.yaml"), "version: 0\n")?;
    git(dir, &["add", "."])?;
    git(dir, &["commit", "-m", "init"])?;
    for channel in channels {
        if *channel != "main" {
            git(dir, &["branch", channel])?;
        }
    }
    Ok(())
}

/// Commit `contents` to `file` on `channel` and return the new revision.
pub fn commit_to_channel(dir: &Path, channel: &str, file: &str, contents: &str) -> Result<String> {
    git(dir, &["checkout", "-q", channel])?;
    std::fs::write(dir.join(file), contents)?;
    git(dir, &["add", file])?;
    git(dir, &["commit", "-q", "-m", &format!("update {file}")])?;
    let rev = git(dir, &["rev-parse", "HEAD"])?;
    git(dir, &["checkout", "-q", "main"])?;
    Ok(rev)
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("run git {:?}", args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: git {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
