//! The git subcommands used to install a dependency.

use std::path::Path;

use crate::error::GitError;
use crate::invocation::{GitInvocation, GitRunner};

/// `git clone [--depth 1 --branch <branch>] <uri> <dir>`
pub async fn clone<R: GitRunner>(
    git: &R,
    uri: &str,
    dir: &Path,
    branch: Option<&str>,
) -> Result<(), GitError> {
    let mut args = vec!["clone".to_string()];
    if let Some(branch) = branch {
        args.extend(["--depth", "1", "--branch", branch].map(String::from));
    }
    args.push(uri.to_string());
    args.push(dir.display().to_string());
    git.run(GitInvocation::new(args)).await.map(drop)
}

/// `git fetch origin`
pub async fn fetch<R: GitRunner>(git: &R, dir: &Path) -> Result<(), GitError> {
    git.run(GitInvocation::new(["fetch", "origin"]).cwd(dir))
        .await
        .map(drop)
}

/// `git reset --hard <rev>`
pub async fn reset_hard<R: GitRunner>(git: &R, dir: &Path, rev: &str) -> Result<(), GitError> {
    git.run(GitInvocation::new(["reset", "--hard", rev]).cwd(dir))
        .await
        .map(drop)
}

/// `git tag --list`, one tag per entry.
pub async fn list_tags<R: GitRunner>(git: &R, dir: &Path) -> Result<Vec<String>, GitError> {
    let out = git
        .run(GitInvocation::new(["tag", "--list"]).cwd(dir).capture())
        .await?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect())
}

/// `git submodule update --init --recursive`
pub async fn update_submodules<R: GitRunner>(git: &R, dir: &Path) -> Result<(), GitError> {
    git.run(GitInvocation::new(["submodule", "update", "--init", "--recursive"]).cwd(dir))
        .await
        .map(drop)
}

/// `git config <key> <value>` in the repository at `dir`.
pub async fn config<R: GitRunner>(
    git: &R,
    dir: &Path,
    key: &str,
    value: &str,
) -> Result<(), GitError> {
    git.run(GitInvocation::new(["config", key, value]).cwd(dir))
        .await
        .map(drop)
}

/// `git rev-parse HEAD`, trimmed.
pub async fn rev_parse_head<R: GitRunner>(git: &R, dir: &Path) -> Result<String, GitError> {
    let out = git
        .run(GitInvocation::new(["rev-parse", "HEAD"]).cwd(dir).capture())
        .await?;
    Ok(out.trim().to_string())
}

/// `git verify-tag <tag>` with extra environment, e.g. `GNUPGHOME`.
pub async fn verify_tag<R: GitRunner>(
    git: &R,
    dir: &Path,
    tag: &str,
    envs: &[(String, String)],
) -> Result<(), GitError> {
    let mut invocation = GitInvocation::new(["verify-tag", tag]).cwd(dir);
    for (key, value) in envs {
        invocation = invocation.env(key.as_str(), value.as_str());
    }
    git.run(invocation).await.map(drop)
}
