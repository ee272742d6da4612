//! De-duplicates installs by install key.
//!
//! A single task owns the table of install records and is driven by events:
//! install requests from connection handlers and completions from the
//! pipelines it spawned. Requests for a key that is already being installed
//! queue up behind it and are answered in arrival order with the same
//! outcome. Finished records are kept for the life of the service, so a
//! failed key stays failed.

use std::collections::HashMap;
use std::sync::Arc;

use git_runner::GitRunner;
use tokio::sync::{
    mpsc::{self, Sender},
    oneshot,
};
use tracing::{debug, error};

use crate::entity::{Descriptor, InstallError, InstallKey, Installation, ResolvedDependency};

use super::{context::InstallContext, pipeline};

type InstallOutcome = Result<Installation, InstallError>;

pub enum CoordinatorEvent {
    /// Install request, answered once the key settles
    Install(Descriptor, oneshot::Sender<InstallOutcome>),
    /// Pipeline for a key finished
    Finished(InstallKey, InstallOutcome),
}

enum InstallRecord {
    InFlight(Vec<oneshot::Sender<InstallOutcome>>),
    Resolved(Installation),
    Failed(InstallError),
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    tx: Sender<CoordinatorEvent>,
}

impl Coordinator {
    pub fn spawn<G: GitRunner>(ctx: Arc<InstallContext<G>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<CoordinatorEvent>(64);
        //pipelines report back without keeping the loop alive
        let weak_tx = tx.downgrade();

        tokio::spawn(async move {
            let mut records: HashMap<InstallKey, InstallRecord> = HashMap::new();

            while let Some(event) = rx.recv().await {
                match event {
                    CoordinatorEvent::Install(descriptor, reply) => {
                        let key = descriptor.install_key();
                        match records.get_mut(&key) {
                            Some(InstallRecord::InFlight(waiters)) => {
                                debug!("{} => already installing, queued", key);
                                waiters.push(reply);
                            }
                            Some(InstallRecord::Resolved(installation)) => {
                                let _ = reply.send(Ok(installation.clone()));
                            }
                            Some(InstallRecord::Failed(e)) => {
                                let _ = reply.send(Err(e.clone()));
                            }
                            None => {
                                records.insert(key.clone(), InstallRecord::InFlight(vec![reply]));
                                let ctx = ctx.clone();
                                let weak_tx = weak_tx.clone();
                                tokio::spawn(async move {
                                    let outcome = pipeline::install(&ctx, &descriptor, &key).await;
                                    let Some(tx) = weak_tx.upgrade() else {
                                        return;
                                    };
                                    if let Err(e) =
                                        tx.send(CoordinatorEvent::Finished(key, outcome)).await
                                    {
                                        error!("install finished tx error: {}", e);
                                    }
                                });
                            }
                        }
                    }
                    CoordinatorEvent::Finished(key, outcome) => {
                        let record = match &outcome {
                            Ok(installation) => InstallRecord::Resolved(installation.clone()),
                            Err(e) => {
                                error!("{} => install failed: {}", key, e);
                                InstallRecord::Failed(e.clone())
                            }
                        };
                        if let Some(InstallRecord::InFlight(waiters)) = records.insert(key, record)
                        {
                            for waiter in waiters {
                                let _ = waiter.send(outcome.clone());
                            }
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    /// Resolves one descriptor. Local paths are answered without touching the
    /// install table.
    pub async fn install(
        &self,
        descriptor: &Descriptor,
    ) -> Result<ResolvedDependency, InstallError> {
        if descriptor.is_local() {
            return Ok(ResolvedDependency::local(descriptor));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordinatorEvent::Install(descriptor.clone(), reply_tx))
            .await
            .map_err(|_| stopped())?;
        let installation = reply_rx.await.map_err(|_| stopped())??;
        Ok(ResolvedDependency::remote(descriptor, &installation))
    }
}

fn stopped() -> InstallError {
    InstallError::Io {
        context: "install coordinator".to_string(),
        reason: "stopped before the install finished".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use futures::future::join_all;

    use super::*;
    use crate::controller::testing::{context, deps_dir, FakeGit, FAKE_HEAD};
    use crate::usecase::{IndirectionFileAlias, SymlinkAlias};

    fn parse(text: &str) -> Descriptor {
        Descriptor::parse(text).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_installs_share_one_pipeline() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let a = parse("https://example.com/org/x:x.gyp:a");
        let b = parse("https://example.com/org/x => x.gyp:b");
        let results = join_all((0..5).map(|i| {
            let coordinator = coordinator.clone();
            let descriptor = if i % 2 == 0 { a.clone() } else { b.clone() };
            async move { coordinator.install(&descriptor).await }
        }))
        .await;

        assert_eq!(git.count("clone"), 1);
        assert_eq!(git.count("submodule"), 1);
        let dir = deps_dir(project.path()).join("example.com/org/x@latest");
        for (i, result) in results.into_iter().enumerate() {
            let resolved = result.unwrap();
            assert_eq!(resolved.dir, dir);
            let target = if i % 2 == 0 { "a" } else { "b" };
            assert!(resolved.dep.ends_with(&format!("x.gyp:{target}")));
        }

        //settled keys never reach git again
        coordinator.install(&a).await.unwrap();
        assert_eq!(git.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_existing_checkout_is_fetched() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let dir = deps_dir(project.path()).join("indutny/bud@dev");
        std::fs::create_dir_all(&dir).unwrap();
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        coordinator
            .install(&parse("https://github.com/indutny/bud#dev:bud.gyp:bud"))
            .await
            .unwrap();
        let calls = git.calls();
        assert_eq!(calls[0].args, vec!["fetch", "origin"]);
        assert_eq!(calls[1].args, vec!["reset", "--hard", "origin/dev"]);
        assert_eq!(calls[1].cwd.as_deref(), Some(dir.as_path()));
        assert_eq!(git.count("clone"), 0);
    }

    #[tokio::test]
    async fn test_branch_clone_is_shallow() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        coordinator
            .install(&parse("git@github.com:indutny/bud#dev:bud.gyp:bud"))
            .await
            .unwrap();
        let clone = &git.calls()[0];
        assert_eq!(
            clone.args[..5],
            ["clone", "--depth", "1", "--branch", "dev"].map(String::from)
        );
        assert_eq!(clone.args[5], "git+ssh://git@github.com/indutny/bud");
        let config = git
            .calls()
            .into_iter()
            .find(|c| c.subcommand() == Some("config"))
            .unwrap();
        assert_eq!(config.args, vec!["config", "gpg.program", "gpg"]);
    }

    #[tokio::test]
    async fn test_failure_is_permanent() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default().fail_on("clone", "fatal: repository not found\n");
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);
        let descriptor = parse("https://example.com/missing:x.gyp:x");

        let first = coordinator.install(&descriptor).await.unwrap_err();
        let second = coordinator.install(&descriptor).await.unwrap_err();
        assert_eq!(first, second);
        assert!(first.to_string().ends_with("fatal: repository not found\n"));
        assert_eq!(git.count("clone"), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default().fail_on("clone", "fatal: repository not found\n");
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);
        let descriptor = parse("https://example.com/missing:x.gyp:x");

        let results = join_all((0..4).map(|_| {
            let coordinator = coordinator.clone();
            let descriptor = descriptor.clone();
            async move { coordinator.install(&descriptor).await }
        }))
        .await;

        assert_eq!(git.count("clone"), 1);
        let errors = results
            .into_iter()
            .map(|r| r.unwrap_err())
            .collect::<Vec<_>>();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], InstallError::GitOperationFailed { .. }));
        assert!(errors.iter().all(|e| *e == errors[0]));
    }

    #[tokio::test]
    async fn test_unparsable_range_has_no_match() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::with_tags(&["v1.0.0"]);
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let err = coordinator
            .install(&parse("https://example.com/x@>>1:x.gyp:x"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InstallError::NoMatchingVersion {
                uri: "https://example.com/x".to_string(),
                range: ">>1".to_string(),
            }
        );
        assert_eq!(git.count("tag"), 0);
    }

    #[tokio::test]
    async fn test_semver_selects_highest_matching_tag() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::with_tags(&["v1.0.0", "v1.2.0", "v2.0.0", "nightly"]);
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let resolved = coordinator
            .install(&parse("https://example.com/x@^1.0.0:x.gyp:lib"))
            .await
            .unwrap();
        assert_eq!(
            resolved.dir,
            deps_dir(project.path()).join("example.com/x@v1.2.0")
        );
        assert!(resolved.dep.ends_with("x.gyp:lib"));
        let reset = git
            .calls()
            .into_iter()
            .find(|c| c.subcommand() == Some("reset"))
            .unwrap();
        assert_eq!(reset.args, vec!["reset", "--hard", "v1.2.0"]);

        let err = coordinator
            .install(&parse("https://example.com/x@>3.0.0:x.gyp:lib"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InstallError::NoMatchingVersion {
                uri: "https://example.com/x".to_string(),
                range: ">3.0.0".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_ranges_converge_on_one_alias() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::with_tags(&["v1.0.0", "v1.2.0", "v2.0.0"]);
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let caret = coordinator
            .install(&parse("https://example.com/x@^1.0.0:x.gyp:lib"))
            .await
            .unwrap();
        let tilde = coordinator
            .install(&parse("https://example.com/x@~1.2.0:x.gyp:lib"))
            .await
            .unwrap();
        assert_eq!(caret.dir, tilde.dir);
        assert_eq!(git.count("clone"), 2);
        let alias = deps_dir(project.path()).join("example.com/x@v1.2.0");
        assert!(std::fs::symlink_metadata(&alias).is_ok());
    }

    #[tokio::test]
    async fn test_indirection_alias_resolves_to_checkout() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::with_tags(&["v1.0.0"]);
        let ctx = context(project.path(), git, Box::new(IndirectionFileAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let descriptor = parse("https://example.com/x@1.0.0:x.gyp:lib");
        let resolved = coordinator.install(&descriptor).await.unwrap();
        let checkout = descriptor.install_key().dir(&deps_dir(project.path()));
        assert_eq!(resolved.dir, checkout);
        assert!(resolved.dir.is_dir());
    }

    #[tokio::test]
    async fn test_signature_checked_only_when_flagged() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::with_tags(&["v1.0.0"]);
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        coordinator
            .install(&parse("https://github.com/indutny/a@^1.0.0:a.gyp:a"))
            .await
            .unwrap();
        coordinator
            .install(&parse("https://github.com/indutny/b#main [gpg]:b.gyp:b"))
            .await
            .unwrap();
        assert_eq!(git.count("verify-tag"), 0);

        coordinator
            .install(&parse("https://github.com/indutny/c@^1.0.0 [gpg]:c.gyp:c"))
            .await
            .unwrap();
        let verify = git
            .calls()
            .into_iter()
            .find(|c| c.subcommand() == Some("verify-tag"))
            .unwrap();
        assert_eq!(verify.args, vec!["verify-tag", "v1.0.0"]);
        let keyring = deps_dir(project.path()).join(".keyrings/indutny");
        assert_eq!(
            verify.envs,
            vec![("GNUPGHOME".to_string(), keyring.display().to_string())]
        );
    }

    #[tokio::test]
    async fn test_bad_signature_fails_install() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::with_tags(&["v1.0.0"]).fail_on("verify-tag", "gpg: BAD signature\n");
        let ctx = context(project.path(), git, Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let err = coordinator
            .install(&parse("https://github.com/indutny/c@^1.0.0 [gpg=team]:c.gyp:c"))
            .await
            .unwrap_err();
        match err {
            InstallError::SignatureVerificationFailed { tag, detail } => {
                assert_eq!(tag, "v1.0.0");
                assert!(detail.contains("BAD signature"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hash_captured_when_freezing() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let ctx = context(project.path(), git, Box::new(SymlinkAlias), true);
        let coordinator = Coordinator::spawn(ctx);

        let resolved = coordinator
            .install(&parse("https://example.com/x:x.gyp:x"))
            .await
            .unwrap();
        assert_eq!(resolved.hash.as_deref(), Some(FAKE_HEAD));
    }

    #[tokio::test]
    async fn test_local_skips_git() {
        let project = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let ctx = context(project.path(), git.clone(), Box::new(SymlinkAlias), false);
        let coordinator = Coordinator::spawn(ctx);

        let resolved = coordinator
            .install(&parse("./vendor/x:x.gyp:x"))
            .await
            .unwrap();
        assert_eq!(resolved.dir, PathBuf::from("./vendor/x"));
        assert!(git.calls().is_empty());
    }
}
