//! Dependency descriptor: `uri [flags] (":" | "=>") file ":" target`.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::ParseError;
use crate::flags::Flags;
use crate::key::{semver_hash, InstallKey, DEFAULT_HOST, SEMVER_SUFFIX};

static DESCRIPTOR_RE: OnceLock<Regex> = OnceLock::new();
static BRANCH_RE: OnceLock<Regex> = OnceLock::new();
static RANGE_RE: OnceLock<Regex> = OnceLock::new();
static SSH_SHORTHAND_RE: OnceLock<Regex> = OnceLock::new();

fn descriptor_re() -> &'static Regex {
    DESCRIPTOR_RE.get_or_init(|| {
        Regex::new(
            r"^(?P<uri>[^\s\[\]]+)\s*(?:\[(?P<flags>[^\]]*)\])?\s*(?::|=>)\s*(?P<file>[^:]+):(?P<target>[^:]+)$",
        )
        .unwrap()
    })
}

fn branch_re() -> &'static Regex {
    BRANCH_RE.get_or_init(|| Regex::new(r"#([^#]+)$").unwrap())
}

fn range_re() -> &'static Regex {
    RANGE_RE.get_or_init(|| Regex::new(r"@([^@:/]+)$").unwrap())
}

fn ssh_shorthand_re() -> &'static Regex {
    SSH_SHORTHAND_RE.get_or_init(|| Regex::new(r"^([\w.-]+)@([^:/]+):(.+)$").unwrap())
}

/// What a descriptor asks for: a branch, a version range, or the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Latest,
    Branch(String),
    Range(String),
}

impl Qualifier {
    pub fn branch(&self) -> Option<&str> {
        match self {
            Qualifier::Branch(branch) => Some(branch),
            _ => None,
        }
    }

    pub fn range(&self) -> Option<&str> {
        match self {
            Qualifier::Range(range) => Some(range),
            _ => None,
        }
    }
}

/// Where the dependency lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Plain path, used as is and never version-controlled
    Local(PathBuf),
    /// Repository cloned under the dependency root
    Remote(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Exact text the descriptor was parsed from
    pub raw: String,
    /// Normalized uri without its qualifier
    pub uri: String,
    pub source: Source,
    pub qualifier: Qualifier,
    pub flags: Flags,
    /// Project file inside the dependency, e.g. `bud.gyp`
    pub target_file: String,
    /// Target inside `target_file`
    pub target_name: String,
}

impl Descriptor {
    /// Parse a descriptor line.
    ///
    /// Either the whole descriptor is recognized or `MalformedDescriptor` is
    /// returned; there are no partial results.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedDescriptor(text.to_string());

        let caps = descriptor_re().captures(text.trim()).ok_or_else(malformed)?;

        let flags = match caps.name("flags") {
            Some(m) => Flags::parse(m.as_str()).ok_or_else(malformed)?,
            None => Flags::default(),
        };
        let target_file = caps["file"].trim().to_string();
        let target_name = caps["target"].trim().to_string();
        if target_file.is_empty() || target_name.is_empty() {
            return Err(malformed());
        }

        let (uri, qualifier) = split_qualifier(&caps["uri"]);
        if uri.is_empty() {
            return Err(malformed());
        }
        //the branch ends up in a directory name under the dependency root
        if let Some(branch) = qualifier.branch() {
            if branch.split(['/', '\\']).any(|part| part == ".." || part == ".") {
                return Err(malformed());
            }
        }
        let uri = normalize_ssh_shorthand(&uri);

        let source = match Url::parse(&uri) {
            Ok(url) if url.scheme().len() > 1 && !url.cannot_be_a_base() => Source::Remote(url),
            _ => {
                if qualifier.branch().is_some() {
                    return Err(ParseError::BranchOnLocalDependency(text.to_string()));
                }
                Source::Local(PathBuf::from(&uri))
            }
        };

        Ok(Self {
            raw: text.to_string(),
            uri,
            source,
            qualifier,
            flags,
            target_file,
            target_name,
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, Source::Local(_))
    }

    /// Derive the install key.
    ///
    /// Local dependencies use their path. Remote ones use `host/path` (the host
    /// is left out for [`DEFAULT_HOST`]) followed by `@branch`,
    /// `@semver-<hash>` or `@latest`.
    pub fn install_key(&self) -> InstallKey {
        let url = match &self.source {
            Source::Local(path) => return InstallKey::new(path.to_string_lossy()),
            Source::Remote(url) => url,
        };

        let mut id = url.path().trim_matches('/').to_string();
        match &self.qualifier {
            Qualifier::Branch(branch) => {
                id.push('@');
                id.push_str(branch);
            }
            Qualifier::Range(range) => {
                id.push_str(SEMVER_SUFFIX);
                id.push_str(&semver_hash(range));
            }
            Qualifier::Latest => id.push_str("@latest"),
        }

        match url.host_str() {
            Some(host) if host != DEFAULT_HOST => match url.port() {
                Some(port) => InstallKey::new(format!("{host}:{port}/{id}")),
                None => InstallKey::new(format!("{host}/{id}")),
            },
            _ => InstallKey::new(id),
        }
    }

    /// First path segment of a remote uri, usually the repository owner.
    pub fn owner(&self) -> Option<&str> {
        match &self.source {
            Source::Remote(url) => url.path_segments()?.find(|s| !s.is_empty()),
            Source::Local(_) => None,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)?;
        match &self.qualifier {
            Qualifier::Branch(branch) => write!(f, "#{branch}")?,
            Qualifier::Range(range) => write!(f, "@{range}")?,
            Qualifier::Latest => {}
        }
        if !self.flags.is_empty() {
            write!(f, " [{}]", self.flags)?;
        }
        write!(f, ":{}:{}", self.target_file, self.target_name)
    }
}

/// `#branch` wins over `@range`; at most one of them is extracted.
fn split_qualifier(uri: &str) -> (String, Qualifier) {
    if let Some(m) = branch_re().captures(uri) {
        let whole = m.get(0).map_or(uri.len(), |m| m.start());
        return (uri[..whole].to_string(), Qualifier::Branch(m[1].to_string()));
    }
    if let Some(m) = range_re().captures(uri) {
        let whole = m.get(0).map_or(uri.len(), |m| m.start());
        return (uri[..whole].to_string(), Qualifier::Range(m[1].to_string()));
    }
    (uri.to_string(), Qualifier::Latest)
}

/// `git@host:path` -> `git+ssh://git@host/path`
fn normalize_ssh_shorthand(uri: &str) -> String {
    if uri.contains("://") {
        return uri.to_string();
    }
    ssh_shorthand_re()
        .replace(uri, "git+ssh://$1@$2/$3")
        .into_owned()
}
