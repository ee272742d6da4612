//! Error types for descriptor-parser.

use thiserror::Error;

/// Errors produced while parsing a dependency descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The text does not have the `uri:file.gyp:target` shape
    #[error("malformed dependency `{0}`, format is \"url[flags]:file.gyp:target\"")]
    MalformedDescriptor(String),

    /// A `#branch` qualifier was given for a local path
    #[error("can't use a branch of a local dependency `{0}`")]
    BranchOnLocalDependency(String),
}
