use semver::{Version, VersionReq};

use crate::entity::InstallError;

/// A node-style version range: `||` separated alternatives, each a
/// whitespace separated conjunction of comparators.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(range: &str) -> Result<Self, InstallError> {
        let alternatives = range
            .split("||")
            .map(|alt| {
                let req = to_req_syntax(alt);
                VersionReq::parse(&req).map_err(|e| InstallError::InvalidRange {
                    range: range.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: range.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Highest `v`-prefixed tag satisfying the range.
    pub fn select<'a, I>(&self, tags: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tags.into_iter()
            .filter_map(|tag| {
                let version = Version::parse(tag.strip_prefix('v')?).ok()?;
                self.matches(&version).then_some((version, tag))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, tag)| tag)
    }
}

/// Rewrites one conjunction into the comma separated form `VersionReq` reads.
fn to_req_syntax(alternative: &str) -> String {
    let tokens = alternative.split_whitespace().collect::<Vec<_>>();

    //hyphen range "a - b"
    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={}, <={}", trim_v(low), trim_v(high));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        //">= 1.2.3" is written with a space
        if token.chars().all(|c| "<>=~^".contains(c)) {
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{}", trim_v(token)),
            None => bare_comparator(token),
        };
        comparators.push(comparator);
    }

    if comparators.is_empty() {
        return "*".to_string();
    }
    comparators.join(", ")
}

fn bare_comparator(token: &str) -> String {
    let op_len = token
        .find(|c: char| !"<>=~^".contains(c))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);
    let version = trim_v(version);
    if !op.is_empty() {
        return format!("{op}{version}");
    }
    //bare versions are exact, partial ones and wildcards already mean "any in"
    let core = version.split(['-', '+']).next().unwrap_or(version);
    if core.contains(['x', 'X', '*']) {
        version.to_string()
    } else {
        format!("={version}")
    }
}

fn trim_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('='))
        .unwrap_or(version)
}
