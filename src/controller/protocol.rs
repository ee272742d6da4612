//! Line-delimited JSON messages exchanged with the generator.
//!
//! Every frame is one object `{cmd, data?, error?}` followed by `\n`. A
//! response carries `<cmd>-result` and either `data` or `error`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEPS: &str = "deps";
pub const TYPE: &str = "type";
pub const SCOPED_GPG: &str = "scoped-gpg";
pub const LOG: &str = "log";
/// `cmd` of the reply to a frame that was not valid JSON
pub const ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: cmd.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(cmd: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn encode(&self) -> String {
        //a struct of strings and values always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn result_cmd(cmd: &str) -> String {
    format!("{cmd}-result")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScopedGpgRequest {
    pub argv: Vec<String>,
    #[serde(default)]
    pub stdin: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Deps(Vec<String>),
    Type(PathBuf),
    ScopedGpg(ScopedGpgRequest),
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    UnknownCommand(String),
    InvalidData(String, String),
}

impl RequestError {
    /// Reply sent back for the failed request.
    pub fn into_message(self) -> Message {
        match self {
            RequestError::UnknownCommand(cmd) => {
                let error = format!("unknown command `{cmd}`");
                Message::failure(result_cmd(&cmd), error)
            }
            RequestError::InvalidData(cmd, reason) => {
                let error = format!("invalid `{cmd}` data: {reason}");
                Message::failure(result_cmd(&cmd), error)
            }
        }
    }
}

impl TryFrom<Message> for Request {
    type Error = RequestError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        let cmd = message.cmd;
        let data = message.data.unwrap_or(Value::Null);
        let invalid = |e: serde_json::Error| RequestError::InvalidData(cmd.clone(), e.to_string());
        match cmd.as_str() {
            DEPS => Ok(Request::Deps(serde_json::from_value(data).map_err(invalid)?)),
            TYPE => Ok(Request::Type(serde_json::from_value(data).map_err(invalid)?)),
            SCOPED_GPG => Ok(Request::ScopedGpg(
                serde_json::from_value(data).map_err(invalid)?,
            )),
            LOG => Ok(Request::Log(match data {
                Value::String(text) => text,
                other => other.to_string(),
            })),
            _ => Err(RequestError::UnknownCommand(cmd)),
        }
    }
}
