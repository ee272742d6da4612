//! Test doubles shared by the controller tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git_runner::{GitError, GitInvocation, GitRunner};
use parking_lot::Mutex;

use crate::{config::Config, usecase::DirectoryAlias};

use super::{context::InstallContext, interactive::InteractiveLock};

pub const FAKE_HEAD: &str = "3f786850e387550fdab836ed7e6dc881de23001b";

/// In-memory git: clones create the target directory, `tag --list` returns
/// the configured tags and every invocation is recorded.
#[derive(Debug, Clone)]
pub struct FakeGit {
    calls: Arc<Mutex<Vec<GitInvocation>>>,
    tags: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<Option<(String, String)>>>,
    delay: Duration,
}

impl Default for FakeGit {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            tags: Arc::default(),
            fail: Arc::default(),
            delay: Duration::from_millis(20),
        }
    }
}

impl FakeGit {
    pub fn with_tags(tags: &[&str]) -> Self {
        let git = Self::default();
        *git.tags.lock() = tags.iter().map(|t| t.to_string()).collect();
        git
    }

    /// Makes every `subcommand` invocation fail with `stderr`.
    pub fn fail_on(self, subcommand: &str, stderr: &str) -> Self {
        *self.fail.lock() = Some((subcommand.to_string(), stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<GitInvocation> {
        self.calls.lock().clone()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.subcommand() == Some(subcommand))
            .count()
    }
}

impl GitRunner for FakeGit {
    async fn run(&self, invocation: GitInvocation) -> Result<String, GitError> {
        tokio::time::sleep(self.delay).await;
        self.calls.lock().push(invocation.clone());

        let failure = self.fail.lock().clone();
        if let Some((subcommand, stderr)) = failure {
            if invocation.subcommand() == Some(subcommand.as_str()) {
                return Err(GitError::OperationFailed {
                    args: invocation.args,
                    cwd: invocation.cwd,
                    stderr,
                });
            }
        }

        let out = match invocation.subcommand() {
            Some("clone") => {
                if let Some(dir) = invocation.args.last() {
                    let _ = std::fs::create_dir_all(dir);
                }
                String::new()
            }
            Some("tag") => self.tags.lock().join("\n") + "\n",
            Some("rev-parse") => format!("{FAKE_HEAD}\n"),
            _ => String::new(),
        };
        Ok(if invocation.capture_stdout {
            out
        } else {
            String::new()
        })
    }
}

/// Context over a fresh project directory.
pub fn context(
    project: &Path,
    git: FakeGit,
    alias: Box<dyn DirectoryAlias>,
    freeze: bool,
) -> Arc<InstallContext<FakeGit>> {
    let mut config = Config::for_project(project);
    config.freeze = freeze;
    InstallContext::new(config, git, alias, InteractiveLock::with_sink(std::io::sink()))
}

pub fn deps_dir(project: &Path) -> PathBuf {
    project.join(crate::config::DEPS_DIR)
}
