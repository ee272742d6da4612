use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::GitError;

/// One git run: arguments, working directory, extra environment.
///
/// stdin is always inherited and stderr always captured; stdout is captured
/// only when [`GitInvocation::capture`] was called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInvocation {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub capture_stdout: bool,
    pub envs: Vec<(String, String)>,
}

impl GitInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Name of the subcommand, e.g. `clone`.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Something that can execute git invocations.
///
/// Returns the captured stdout, or an empty string when stdout was not
/// captured.
pub trait GitRunner: Send + Sync + 'static {
    fn run(
        &self,
        invocation: GitInvocation,
    ) -> impl Future<Output = Result<String, GitError>> + Send;
}
