//! Client side of the command service, used from inside the generator.

use std::path::Path;

use anyhow::{anyhow, bail, Context as _};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use super::protocol::{self, Message};

pub struct Client {
    framed: Framed<TcpStream, LinesCodec>,
}

impl Client {
    pub async fn connect(host: &str, port: u16) -> anyhow::Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("failed to connect to gypkg at {host}:{port}"))?;
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new()),
        })
    }

    /// Sends `cmd` and waits for its result.
    pub async fn request(&mut self, cmd: &str, data: Value) -> anyhow::Result<Value> {
        self.framed
            .send(Message::new(cmd, data).encode())
            .await
            .context("failed to send request")?;

        let expected = protocol::result_cmd(cmd);
        while let Some(line) = self.framed.next().await {
            let message = Message::decode(&line.context("failed to read reply")?)
                .context("malformed reply")?;
            if let Some(error) = message.error {
                bail!(error);
            }
            if message.cmd == expected {
                return Ok(message.data.unwrap_or(Value::Null));
            }
        }
        Err(anyhow!("connection closed before `{expected}` arrived"))
    }

    pub async fn deps(&mut self, descriptors: &[String]) -> anyhow::Result<Vec<String>> {
        let data = self.request(protocol::DEPS, json!(descriptors)).await?;
        serde_json::from_value(data).context("malformed deps result")
    }

    pub async fn target_type(&mut self, cwd: &Path) -> anyhow::Result<String> {
        let data = self.request(protocol::TYPE, json!(cwd)).await?;
        serde_json::from_value(data).context("malformed type result")
    }

    /// Forwards a line to the service log. No reply is sent for it.
    pub async fn log(&mut self, text: &str) -> anyhow::Result<()> {
        self.framed
            .send(Message::new(protocol::LOG, json!(text)).encode())
            .await
            .context("failed to send log line")
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::controller::{
        service::CommandService,
        testing::{context, FakeGit},
    };
    use crate::usecase::{SymlinkAlias, EXECUTABLE};

    #[tokio::test]
    async fn test_client_against_service() {
        let project = tempfile::tempdir().unwrap();
        let ctx = context(project.path(), FakeGit::default(), Box::new(SymlinkAlias), false);
        let service = CommandService::new(ctx);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = service.serve(listener);

        let mut client = Client::connect("127.0.0.1", port).await.unwrap();
        client.log("hello from the generator").await.unwrap();
        let deps = client
            .deps(&["https://example.com/x:x.gyp:x".to_string()])
            .await
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert!(deps[0].ends_with("example.com/x@latest/x.gyp:x"));
        assert_eq!(client.target_type(project.path()).await.unwrap(), EXECUTABLE);

        let err = client
            .deps(&["not a descriptor".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed dependency"));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(Client::connect("127.0.0.1", port).await.is_err());
    }
}
