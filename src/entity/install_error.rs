use std::path::{Path, PathBuf};

use descriptor_parser::ParseError;
use git_runner::GitError;
use thiserror::Error;

/// Why an install failed.
///
/// Cloneable because one outcome is handed to every request waiting on the
/// same install key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("git {} failed{}\n{stderr}", .args.join(" "), in_dir(.cwd.as_deref()))]
    GitOperationFailed {
        args: Vec<String>,
        cwd: Option<PathBuf>,
        stderr: String,
    },

    #[error("No matching version found, {uri}:{range}")]
    NoMatchingVersion { uri: String, range: String },

    #[error("invalid version range `{range}`: {reason}")]
    InvalidRange { range: String, reason: String },

    #[error("signature verification failed for tag `{tag}`\n{detail}")]
    SignatureVerificationFailed { tag: String, detail: String },

    #[error("failed to create alias {}: {reason}", .alias.display())]
    AliasCreationFailed { alias: PathBuf, reason: String },

    #[error("{context}: {reason}")]
    Io { context: String, reason: String },
}

impl InstallError {
    pub fn io(context: impl Into<String>, e: std::io::Error) -> Self {
        InstallError::Io {
            context: context.into(),
            reason: e.to_string(),
        }
    }
}

impl From<GitError> for InstallError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::OperationFailed { args, cwd, stderr } => {
                InstallError::GitOperationFailed { args, cwd, stderr }
            }
            GitError::SpawnFailed { program, source } => InstallError::Io {
                context: format!("failed to spawn `{program}`"),
                reason: source.to_string(),
            },
        }
    }
}

fn in_dir(cwd: Option<&Path>) -> String {
    match cwd {
        Some(dir) => format!(" in {}", dir.display()),
        None => String::new(),
    }
}
