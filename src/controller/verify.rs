//! Signature checks against per-scope keyrings.
//!
//! Every scope gets its own `GNUPGHOME` under the keyring directory. Both
//! operations here may prompt the operator and run under the interactive
//! lock.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context as _};
use git_runner::{ops, GitRunner};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::entity::{Descriptor, InstallError, InstallKey};

use super::context::InstallContext;

pub const GPG_FLAG: &str = "gpg";

/// Keyring scope requested by a descriptor's `gpg` flag.
///
/// `[gpg=scope]` names it, bare `[gpg]` falls back to the repository owner.
pub fn requested_scope(descriptor: &Descriptor, key: &InstallKey) -> Option<String> {
    let flag = descriptor.flags.get(GPG_FLAG)?;
    let scope = match flag.as_text() {
        Some(scope) => scope.to_string(),
        None => descriptor
            .owner()
            .map(String::from)
            .unwrap_or_else(|| key.as_str().to_string()),
    };
    Some(scope)
}

/// `<keyring dir>/<scope>`, refusing scopes that would escape it.
pub fn keyring_path(keyring_dir: &Path, scope: &str) -> Option<PathBuf> {
    let mut components = Path::new(scope).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Some(keyring_dir.join(name)),
        _ => None,
    }
}

async fn ensure_keyring(keyring_dir: &Path, scope: &str) -> std::io::Result<PathBuf> {
    let path = keyring_path(keyring_dir, scope).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid keyring scope `{scope}`"),
        )
    })?;
    tokio::fs::create_dir_all(&path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).await?;
    }
    Ok(path)
}

/// `git verify-tag <tag>` with the scope's keyring.
pub async fn verify_tag<G: GitRunner>(
    ctx: &InstallContext<G>,
    dir: &Path,
    tag: &str,
    scope: &str,
) -> Result<(), InstallError> {
    let failed = |detail: String| InstallError::SignatureVerificationFailed {
        tag: tag.to_string(),
        detail,
    };
    let keyring = ensure_keyring(&ctx.config.keyring_dir, scope)
        .await
        .map_err(|e| failed(e.to_string()))?;

    let _guard = ctx.interactive.acquire().await;
    debug!("verifying {} in {} with keyring {}", tag, dir.display(), scope);
    let envs = [("GNUPGHOME".to_string(), keyring.display().to_string())];
    ops::verify_tag(&ctx.git, dir, tag, &envs)
        .await
        .map_err(|e| failed(e.to_string()))?;
    info!("{} => signature of {} verified", dir.display(), tag);
    Ok(())
}

/// Runs the gpg program against the scope's keyring, e.g. to import a key.
pub async fn scoped_gpg<G: GitRunner>(
    ctx: &InstallContext<G>,
    argv: &[String],
    stdin: &str,
    scope: &str,
) -> anyhow::Result<()> {
    let keyring = ensure_keyring(&ctx.config.keyring_dir, scope)
        .await
        .with_context(|| format!("failed to prepare keyring `{scope}`"))?;

    let _guard = ctx.interactive.acquire().await;
    debug!("{} {} with keyring {}", ctx.config.gpg, argv.join(" "), scope);
    let mut child = Command::new(&ctx.config.gpg)
        .args(argv)
        .env("GNUPGHOME", &keyring)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", ctx.config.gpg))?;
    if let Some(mut input) = child.stdin.take() {
        input
            .write_all(stdin.as_bytes())
            .await
            .context("failed to write gpg stdin")?;
    }
    let status = child.wait().await.context("failed to wait for gpg")?;
    if !status.success() {
        bail!("{} {} failed: {}", ctx.config.gpg, argv.join(" "), status);
    }
    Ok(())
}
