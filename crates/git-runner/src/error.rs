//! Error types for git-runner.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while running git.
#[derive(Debug, Error)]
pub enum GitError {
    /// The executable could not be started
    #[error("failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// git exited with a non-zero status
    #[error("git {} failed{}\n{stderr}", .args.join(" "), in_dir(.cwd.as_deref()))]
    OperationFailed {
        args: Vec<String>,
        cwd: Option<PathBuf>,
        stderr: String,
    },
}

fn in_dir(cwd: Option<&Path>) -> String {
    match cwd {
        Some(dir) => format!(" in {}", dir.display()),
        None => String::new(),
    }
}
