//! The command service the generator talks to while it runs.

use std::path::Path;
use std::sync::Arc;

use futures::{future::join_all, SinkExt, StreamExt};
use git_runner::GitRunner;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::{
    entity::{Descriptor, InstallError},
    usecase::target_type,
};

use super::{
    context::InstallContext,
    coordinator::Coordinator,
    protocol::{self, Message, Request, ScopedGpgRequest},
    verify,
};

/// A descriptor that could not be resolved during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDescriptor {
    pub descriptor: String,
    pub error: InstallError,
}

pub struct CommandService<G: GitRunner> {
    ctx: Arc<InstallContext<G>>,
    coordinator: Coordinator,
    failures: Mutex<Vec<FailedDescriptor>>,
}

impl<G: GitRunner> CommandService<G> {
    pub fn new(ctx: Arc<InstallContext<G>>) -> Arc<Self> {
        let coordinator = Coordinator::spawn(ctx.clone());
        Arc::new(Self {
            ctx,
            coordinator,
            failures: Mutex::new(Vec::new()),
        })
    }

    /// Accepts connections until the returned task is aborted.
    pub fn serve(self: Arc<Self>, listener: TcpListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("command service accept error: {}", e);
                        continue;
                    }
                };
                debug!("command connection from {}", peer);
                let service = self.clone();
                tokio::spawn(async move {
                    service.handle_connection(stream).await;
                });
            }
        })
    }

    async fn handle_connection(&self, stream: TcpStream) {
        let mut framed = Framed::new(stream, LinesCodec::new());
        while let Some(line) = framed.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("command connection error: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let Some(reply) = self.handle_line(&line).await else {
                continue;
            };
            if let Err(e) = framed.send(reply.encode()).await {
                warn!("command reply error: {}", e);
                break;
            }
        }
    }

    /// Reply to one frame, `None` for messages that expect no reply.
    pub async fn handle_line(&self, line: &str) -> Option<Message> {
        let message = match Message::decode(line) {
            Ok(message) => message,
            Err(e) => return Some(Message::failure(protocol::ERROR, e.to_string())),
        };
        let cmd = message.cmd.clone();
        let request = match Request::try_from(message) {
            Ok(request) => request,
            Err(e) => return Some(e.into_message()),
        };

        let result = match request {
            Request::Log(text) => {
                info!(target: "gypkg::generator", "{}", text.trim_end());
                return None;
            }
            Request::Deps(descriptors) => self.deps(&descriptors).await.map(|deps| json!(deps)),
            Request::Type(cwd) => Ok(json!(self.target_type(&cwd))),
            Request::ScopedGpg(request) => self.scoped_gpg(&request).await.map(|_| json!({})),
        };
        let reply = protocol::result_cmd(&cmd);
        Some(match result {
            Ok(data) => Message::new(reply, data),
            Err(error) => Message::failure(reply, error),
        })
    }

    /// Resolves every descriptor concurrently, keeping the request order.
    pub async fn deps(&self, descriptors: &[String]) -> Result<Vec<String>, String> {
        let results = join_all(descriptors.iter().map(|text| self.resolve(text))).await;
        results.into_iter().collect()
    }

    async fn resolve(&self, text: &str) -> Result<String, String> {
        let outcome = match Descriptor::parse(text) {
            Ok(descriptor) => self.coordinator.install(&descriptor).await,
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(resolved) => {
                self.ctx.freeze.record(text, &resolved);
                Ok(resolved.dep)
            }
            Err(error) => {
                let message = format!("failed to install `{text}`: {error}");
                self.failures.lock().push(FailedDescriptor {
                    descriptor: text.to_string(),
                    error,
                });
                Err(message)
            }
        }
    }

    pub fn target_type(&self, cwd: &Path) -> &'static str {
        target_type(cwd, &self.ctx.config.deps_dir)
    }

    async fn scoped_gpg(&self, request: &ScopedGpgRequest) -> Result<(), String> {
        verify::scoped_gpg(&self.ctx, &request.argv, &request.stdin, &request.scope)
            .await
            .map_err(|e| format!("{e:#}"))
    }

    /// Descriptors that failed so far, in the order they failed.
    pub fn failures(&self) -> Vec<FailedDescriptor> {
        self.failures.lock().clone()
    }

    #[cfg(test)]
    pub fn context(&self) -> &InstallContext<G> {
        &self.ctx
    }
}
