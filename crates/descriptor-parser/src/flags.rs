use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Value of a single descriptor flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Bare `name`
    Enabled(bool),
    /// `name=value`
    Text(String),
}

impl FlagValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FlagValue::Text(text) => Some(text),
            FlagValue::Enabled(_) => None,
        }
    }
}

/// Flags from the bracketed segment of a descriptor, e.g. `[gpg=indutny,shallow]`.
///
/// Unknown flags are kept verbatim; interpreting them is up to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags(BTreeMap<String, FlagValue>);

impl Flags {
    /// Parse a comma separated list of `name` or `name=value` tokens.
    ///
    /// Returns `None` when a token has an empty name.
    pub fn parse(text: &str) -> Option<Self> {
        let mut flags = BTreeMap::new();
        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (name, value) = match token.split_once('=') {
                Some((name, value)) => (name.trim(), FlagValue::Text(value.trim().to_string())),
                None => (token, FlagValue::Enabled(true)),
            };
            if name.is_empty() {
                return None;
            }
            flags.insert(name.to_string(), value);
        }
        Some(Self(flags))
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagValue)> {
        self.0.iter()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens = self
            .0
            .iter()
            .map(|(name, value)| match value {
                FlagValue::Enabled(_) => name.clone(),
                FlagValue::Text(text) => format!("{name}={text}"),
            })
            .collect::<Vec<_>>();
        write!(f, "{}", tokens.join(","))
    }
}
