//! GitCommand: spawn git with index-lock retry.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::error::GitError;
use crate::invocation::{GitInvocation, GitRunner};

static INDEX_LOCK_RE: OnceLock<Regex> = OnceLock::new();

fn index_lock_re() -> &'static Regex {
    INDEX_LOCK_RE.get_or_init(|| Regex::new(r"(?i)index\.lock").unwrap())
}

/// Whether git's stderr reports contention on the repository index lock.
pub fn is_index_lock(stderr: &str) -> bool {
    index_lock_re().is_match(stderr)
}

/// How lock contention is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait between attempts
    pub delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(250),
            max_attempts: None,
        }
    }
}

/// Runs the git executable found at `program`.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
    retry: RetryPolicy,
}

impl GitCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run_once(&self, invocation: &GitInvocation) -> Result<RunOutcome, GitError> {
        let mut command = Command::new(&self.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::inherit())
            .stderr(Stdio::piped())
            .stdout(if invocation.capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &invocation.envs {
            command.env(key, value);
        }

        //`output()` would force stdout to piped, so spawn and wait instead
        let spawn_failed = |e| GitError::SpawnFailed {
            program: self.program.display().to_string(),
            source: e,
        };
        let child = command.spawn().map_err(spawn_failed)?;
        let output = child.wait_with_output().await.map_err(spawn_failed)?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            return Ok(RunOutcome::Success(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ));
        }
        Ok(RunOutcome::Failure(stderr))
    }
}

enum RunOutcome {
    Success(String),
    Failure(String),
}

impl GitRunner for GitCommand {
    #[tracing::instrument(name = "git", level = "trace", skip_all, fields(args = ?invocation.args))]
    async fn run(&self, invocation: GitInvocation) -> Result<String, GitError> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            trace!("attempt {}", attempts);
            let stderr = match self.run_once(&invocation).await? {
                RunOutcome::Success(stdout) => return Ok(stdout),
                RunOutcome::Failure(stderr) => stderr,
            };

            let exhausted = self
                .retry
                .max_attempts
                .is_some_and(|max| attempts >= max);
            if is_index_lock(&stderr) && !exhausted {
                debug!(
                    "git {} hit index.lock, retrying in {:?}",
                    invocation.args.join(" "),
                    self.retry.delay
                );
                tokio::time::sleep(self.retry.delay).await;
                continue;
            }

            warn!("git {} failed", invocation.args.join(" "));
            return Err(GitError::OperationFailed {
                args: invocation.args,
                cwd: invocation.cwd,
                stderr,
            });
        }
    }
}
