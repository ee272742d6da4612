//! Snapshot of every resolution made during a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entity::{DependencyType, InstallError, ResolvedDependency};

pub const FREEZE_FILE: &str = ".gypkg-freeze";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeEntry {
    #[serde(rename = "type")]
    pub kind: DependencyType,
    //relative to the dependency root for remote dependencies
    pub dir: PathBuf,
    pub source: String,
    pub gyp: String,
    pub target: String,
    #[serde(default)]
    pub hash: String,
}

impl FreezeEntry {
    fn new(resolved: &ResolvedDependency, deps_root: &Path) -> Self {
        let dir = resolved
            .dir
            .strip_prefix(deps_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| resolved.dir.clone());
        Self {
            kind: resolved.kind,
            dir,
            source: resolved.source.clone(),
            gyp: resolved.gyp_file.clone(),
            target: resolved.target.clone(),
            hash: resolved.hash.clone().unwrap_or_default(),
        }
    }

    /// Directory of the entry, with relative entries anchored at `deps_root`.
    pub fn absolute_dir(&self, deps_root: &Path) -> PathBuf {
        match self.kind {
            DependencyType::Remote => deps_root.join(&self.dir),
            DependencyType::Local => self.dir.clone(),
        }
    }
}

/// Descriptor text -> frozen entry, ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreezeMap(pub BTreeMap<String, FreezeEntry>);

impl FreezeMap {
    pub fn load(path: &Path) -> Result<Self, InstallError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InstallError::io(format!("failed to read {}", path.display()), e))?;
        serde_json::from_str(&text).map_err(|e| InstallError::Io {
            context: format!("failed to parse {}", path.display()),
            reason: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, descriptor: &str) -> Option<&FreezeEntry> {
        self.0.get(descriptor)
    }
}

/// Accumulates resolutions while enabled; does nothing otherwise.
#[derive(Debug)]
pub struct FreezeRecorder {
    enabled: bool,
    deps_root: PathBuf,
    entries: DashMap<String, ResolvedDependency>,
}

impl FreezeRecorder {
    pub fn new(enabled: bool, deps_root: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            deps_root: deps_root.into(),
            entries: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, descriptor: &str, resolved: &ResolvedDependency) {
        if self.enabled {
            self.entries.insert(descriptor.to_string(), resolved.clone());
        }
    }

    pub fn snapshot(&self) -> FreezeMap {
        FreezeMap(
            self.entries
                .iter()
                .map(|entry| {
                    (
                        entry.key().clone(),
                        FreezeEntry::new(entry.value(), &self.deps_root),
                    )
                })
                .collect(),
        )
    }

    /// Replaces `path` with the full mapping. Written to a sibling first and
    /// renamed into place.
    pub fn flush(&self, path: &Path) -> Result<(), InstallError> {
        if !self.enabled {
            return Ok(());
        }
        let map = self.snapshot();
        let json = serde_json::to_string_pretty(&map).map_err(|e| InstallError::Io {
            context: "failed to serialize freeze map".to_string(),
            reason: e.to_string(),
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json + "\n")
            .map_err(|e| InstallError::io(format!("failed to write {}", tmp.display()), e))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| InstallError::io(format!("failed to replace {}", path.display()), e))?;
        info!("froze {} dependencies into {}", map.len(), path.display());
        Ok(())
    }
}
