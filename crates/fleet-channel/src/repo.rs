use std::sync::LazyLock;

use regex::Regex;

use crate::ChannelError;

static REPO_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/?([\w-]+)(\.git)?$").expect("repository name pattern"));

/// Derive the local directory name of a repository from its URL,
/// e.g. `git@github.com:org/configs.git` -> `configs`.
pub fn repository_name(url: &str) -> Result<String, ChannelError> {
    REPO_NAME_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ChannelError::InvalidRepository(url.to_string()))
}
