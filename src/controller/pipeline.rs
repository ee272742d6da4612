//! The ordered install steps for one remote install key.

use std::path::PathBuf;

use git_runner::{ops, GitRunner};
use tracing::{debug, info};

use crate::entity::{Descriptor, InstallError, InstallKey, Installation};

use super::{context::InstallContext, semver, verify};

/// State threaded through the steps.
struct Checkout<'a> {
    key: &'a InstallKey,
    descriptor: &'a Descriptor,
    //physical checkout
    dir: PathBuf,
    //what callers get, the tag alias after a semver resolve
    effective_dir: PathBuf,
    tag: Option<String>,
}

/// Brings the checkout for `key` up to date and returns where it lives.
///
/// Any failing step ends the install; nothing is rolled back.
#[tracing::instrument(name = "install", level = "debug", skip_all, fields(key = %key))]
pub async fn install<G: GitRunner>(
    ctx: &InstallContext<G>,
    descriptor: &Descriptor,
    key: &InstallKey,
) -> Result<Installation, InstallError> {
    let dir = key.dir(&ctx.config.deps_dir);
    let mut checkout = Checkout {
        key,
        descriptor,
        effective_dir: dir.clone(),
        dir,
        tag: None,
    };

    fetch_or_clone(ctx, &checkout).await?;
    if let Some(range) = descriptor.qualifier.range() {
        let resolved =
            semver::resolve(ctx, key, &checkout.dir, &descriptor.uri, range).await?;
        checkout.effective_dir = resolved.dir;
        checkout.tag = Some(resolved.tag);
    }

    debug!("{} => git submodule update", key);
    ops::update_submodules(&ctx.git, &checkout.dir).await?;
    ops::config(&ctx.git, &checkout.dir, "gpg.program", &ctx.config.gpg).await?;

    verify_signature(ctx, &checkout).await?;

    let hash = if ctx.capture_hash() {
        Some(ops::rev_parse_head(&ctx.git, &checkout.dir).await?)
    } else {
        None
    };

    info!("{} => installed", key);
    Ok(Installation {
        dir: checkout.effective_dir,
        source: descriptor.uri.clone(),
        hash,
    })
}

async fn fetch_or_clone<G: GitRunner>(
    ctx: &InstallContext<G>,
    checkout: &Checkout<'_>,
) -> Result<(), InstallError> {
    let dir = &checkout.dir;
    let exists = tokio::fs::try_exists(dir)
        .await
        .map_err(|e| InstallError::io(format!("failed to check {}", dir.display()), e))?;
    let branch = checkout.descriptor.qualifier.branch();

    if !exists {
        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallError::io(format!("failed to create {}", parent.display()), e))?;
        }
        info!("{} => git clone: {}", checkout.key, checkout.descriptor.uri);
        ops::clone(&ctx.git, &checkout.descriptor.uri, dir, branch).await?;
        return Ok(());
    }

    info!("{} => git fetch: {}", checkout.key, checkout.descriptor.uri);
    ops::fetch(&ctx.git, dir).await?;
    if let Some(branch) = branch {
        ops::reset_hard(&ctx.git, dir, &format!("origin/{branch}")).await?;
    }
    Ok(())
}

async fn verify_signature<G: GitRunner>(
    ctx: &InstallContext<G>,
    checkout: &Checkout<'_>,
) -> Result<(), InstallError> {
    let Some(tag) = &checkout.tag else {
        return Ok(());
    };
    let Some(scope) = verify::requested_scope(checkout.descriptor, checkout.key) else {
        return Ok(());
    };
    verify::verify_tag(ctx, &checkout.dir, tag, &scope).await
}
