//! # descriptor-parser
//!
//! Parse dependency descriptors found in project files and derive the
//! install key that names their checkout under the dependency root.
//!
//! A descriptor has the shape
//!
//! ```text
//! uri ["[" flags "]"] (":" | "=>") file.gyp ":" target
//! ```
//!
//! where `uri` may carry a trailing `#branch` or `@range` qualifier.
//!
//! ## Example
//!
//! ```ignore
//! use descriptor_parser::{Descriptor, Qualifier};
//!
//! let dep = Descriptor::parse("git@github.com:indutny/bud@^1.0.0 [gpg] => bud.gyp:bud")?;
//! assert!(matches!(dep.qualifier, Qualifier::Range(_)));
//! assert!(dep.flags.contains("gpg"));
//! assert!(dep.install_key().as_str().starts_with("indutny/bud@semver-"));
//! ```
//!
//! Parsing performs no I/O; whether a local path exists is never checked here.

mod descriptor;
mod error;
mod flags;
mod key;

pub use descriptor::{Descriptor, Qualifier, Source};
pub use error::ParseError;
pub use flags::{FlagValue, Flags};
pub use key::{semver_hash, InstallKey, DEFAULT_HOST};
