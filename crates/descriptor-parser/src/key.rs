use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Host whose name is left out of install keys.
pub const DEFAULT_HOST: &str = "github.com";

/// Prefix of the qualifier suffix used for version ranges.
pub(crate) const SEMVER_SUFFIX: &str = "@semver-";

/// Canonical name of an install, also its directory under the dependency root.
///
/// Two descriptors with the same normalized uri and qualifier always produce
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstallKey(String);

impl InstallKey {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory of this install under `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Whether the key carries a version-range hash suffix.
    pub fn is_semver(&self) -> bool {
        self.semver_base().is_some()
    }

    /// Key with the `@semver-<hash>` suffix removed.
    pub fn semver_base(&self) -> Option<&str> {
        let (base, hash) = self.0.rsplit_once(SEMVER_SUFFIX)?;
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(base)
    }

    /// Key naming the alias for a concrete tag, e.g. `owner/repo@v1.2.0`.
    pub fn tag_alias(&self, tag: &str) -> Option<InstallKey> {
        self.semver_base()
            .map(|base| InstallKey(format!("{base}@{tag}")))
    }
}

impl fmt::Display for InstallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First eight hex digits of the SHA-256 of a version range.
pub fn semver_hash(range: &str) -> String {
    let digest = Sha256::digest(range.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(8);
    hash
}
