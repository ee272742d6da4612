use std::path::{Path, PathBuf};

use git_runner::{ops, GitRunner};
use tracing::{debug, info, warn};

use crate::{
    entity::{InstallError, InstallKey},
    usecase::VersionRange,
};

use super::context::InstallContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemverCheckout {
    /// Directory to use from now on, the tag alias
    pub dir: PathBuf,
    pub tag: String,
}

/// Checks out the highest tag of `dir` satisfying `range` and points the
/// `<base>@<tag>` alias at it.
pub async fn resolve<G: GitRunner>(
    ctx: &InstallContext<G>,
    key: &InstallKey,
    dir: &Path,
    uri: &str,
    range: &str,
) -> Result<SemverCheckout, InstallError> {
    let no_match = || InstallError::NoMatchingVersion {
        uri: uri.to_string(),
        range: range.to_string(),
    };
    //an unparsable range is one no tag can satisfy
    let version_range = VersionRange::parse(range).map_err(|e| {
        warn!("{} => {}", key, e);
        no_match()
    })?;
    debug!("{} => checking out semver: {}", key, version_range.as_str());

    let tags = ops::list_tags(&ctx.git, dir).await?;
    let tag = version_range
        .select(tags.iter().map(String::as_str))
        .ok_or_else(no_match)?
        .to_string();
    info!("{} => semver match: {}", key, tag);

    ops::reset_hard(&ctx.git, dir, &tag).await?;

    let alias_key = key.tag_alias(&tag).ok_or_else(|| InstallError::AliasCreationFailed {
        alias: dir.to_path_buf(),
        reason: format!("`{key}` is not a version range install"),
    })?;
    let alias = alias_key.dir(&ctx.config.deps_dir);
    let alias_failed = |e: std::io::Error| InstallError::AliasCreationFailed {
        alias: alias.clone(),
        reason: e.to_string(),
    };

    let exists = tokio::fs::symlink_metadata(&alias).await.is_ok();
    if !exists {
        ctx.alias.create(dir, &alias).map_err(alias_failed)?;
    }
    let dir = ctx.alias.resolve(&alias).map_err(alias_failed)?;
    Ok(SemverCheckout { dir, tag })
}
