//! # git-runner
//!
//! Spawn the external `git` executable and capture its diagnostics.
//!
//! ## Overview
//!
//! - [`GitRunner`] is the seam every caller goes through; [`GitCommand`] is the
//!   implementation that spawns a process.
//! - A run that fails while another process holds the repository's
//!   `index.lock` is retried after [`RetryPolicy::delay`] until it succeeds
//!   (or until the optional attempt limit is reached).
//! - Any other non-zero exit becomes [`GitError::OperationFailed`] carrying the
//!   arguments, working directory and captured stderr.
//! - [`ops`] wraps the handful of subcommands used to install a dependency.
//!
//! ## Example
//!
//! ```ignore
//! use git_runner::{ops, GitCommand};
//!
//! let git = GitCommand::new("git");
//! ops::clone(&git, "https://github.com/indutny/bud", dir, None).await?;
//! let tags = ops::list_tags(&git, dir).await?;
//! ```

mod command;
mod error;
mod invocation;
pub mod ops;

pub use command::{is_index_lock, GitCommand, RetryPolicy};
pub use error::GitError;
pub use invocation::{GitInvocation, GitRunner};
