//! Shared state handed to installs and connection handlers.

use std::sync::Arc;

use git_runner::GitRunner;

use crate::{
    config::Config,
    usecase::{DirectoryAlias, FreezeRecorder},
};

use super::interactive::InteractiveLock;

/// Everything an install needs, created once per service and shared behind
/// an `Arc`.
#[derive(Debug)]
pub struct InstallContext<G: GitRunner> {
    pub config: Config,
    pub git: G,
    /// Alias strategy picked for the dependency root at startup
    pub alias: Box<dyn DirectoryAlias>,
    pub interactive: InteractiveLock,
    pub freeze: FreezeRecorder,
}

impl<G: GitRunner> InstallContext<G> {
    pub fn new(
        config: Config,
        git: G,
        alias: Box<dyn DirectoryAlias>,
        interactive: InteractiveLock,
    ) -> Arc<Self> {
        let freeze = FreezeRecorder::new(config.freeze, &config.deps_dir);
        Arc::new(Self {
            config,
            git,
            alias,
            interactive,
            freeze,
        })
    }

    /// Whether installs read back the checked-out revision.
    pub fn capture_hash(&self) -> bool {
        self.freeze.is_enabled()
    }
}
