use std::path::{Path, PathBuf};

use descriptor_parser::{Descriptor, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Local,
    Remote,
}

/// Outcome of installing one install key, shared by every descriptor with that key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    //checkout directory, the tag alias for semver installs
    pub dir: PathBuf,
    //normalized uri the checkout was cloned from
    pub source: String,
    //revision of HEAD, only when hash capture is on
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    //"<dir>/<gyp file>:<target>", what the generator consumes
    pub dep: String,
    pub dir: PathBuf,
    pub kind: DependencyType,
    pub source: String,
    pub gyp_file: String,
    pub target: String,
    pub hash: Option<String>,
}

impl ResolvedDependency {
    /// Local dependencies resolve to their literal path.
    pub fn local(descriptor: &Descriptor) -> Self {
        let dir = match &descriptor.source {
            Source::Local(path) => path.clone(),
            Source::Remote(_) => PathBuf::from(&descriptor.uri),
        };
        Self {
            dep: dep_path(&dir, &descriptor.target_file, &descriptor.target_name),
            source: dir.display().to_string(),
            dir,
            kind: DependencyType::Local,
            gyp_file: descriptor.target_file.clone(),
            target: descriptor.target_name.clone(),
            hash: None,
        }
    }

    pub fn remote(descriptor: &Descriptor, installation: &Installation) -> Self {
        Self {
            dep: dep_path(
                &installation.dir,
                &descriptor.target_file,
                &descriptor.target_name,
            ),
            dir: installation.dir.clone(),
            kind: DependencyType::Remote,
            source: installation.source.clone(),
            gyp_file: descriptor.target_file.clone(),
            target: descriptor.target_name.clone(),
            hash: installation.hash.clone(),
        }
    }
}

fn dep_path(dir: &Path, gyp_file: &str, target: &str) -> String {
    format!("{}:{}", dir.join(gyp_file).display(), target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local() {
        let descriptor = Descriptor::parse("./vendor/x:x.gyp:lib").unwrap();
        let resolved = ResolvedDependency::local(&descriptor);
        assert_eq!(resolved.dep, "./vendor/x/x.gyp:lib");
        assert_eq!(resolved.kind, DependencyType::Local);
        assert_eq!(resolved.source, "./vendor/x");
        assert!(resolved.hash.is_none());
    }

    #[test]
    fn test_remote_uses_own_target() {
        let installation = Installation {
            dir: PathBuf::from("/deps/example.com/x@latest"),
            source: "https://example.com/x".to_string(),
            hash: Some("abc".to_string()),
        };
        let a = Descriptor::parse("https://example.com/x:a.gyp:a").unwrap();
        let b = Descriptor::parse("https://example.com/x => b.gyp:b").unwrap();
        assert_eq!(
            ResolvedDependency::remote(&a, &installation).dep,
            "/deps/example.com/x@latest/a.gyp:a"
        );
        let b = ResolvedDependency::remote(&b, &installation);
        assert_eq!(b.dep, "/deps/example.com/x@latest/b.gyp:b");
        assert_eq!(b.hash.as_deref(), Some("abc"));
    }
}
