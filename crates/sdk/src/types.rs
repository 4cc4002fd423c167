//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from api-rpc crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub run_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub run_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
}

/// Live run as listed by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub target: String,
    pub pgid: i32,
    /// Epoch milliseconds
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListRunsResponse {
    pub runs: Vec<RunSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListScriptsResponse {
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ScriptRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UploadScriptRequest {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScriptResponse {
    pub script: String,
}

/// Stored script with its content
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptContent {
    pub script: String,
    pub content: String,
}

/// Event pushed for a followed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RunEvent {
    Stdout {
        data: String,
    },
    Stderr {
        data: String,
    },
    /// Always the last event; `code` is `None` when killed by a signal
    Exit {
        code: Option<i32>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl RunEvent {
    pub fn is_exit(&self) -> bool {
        matches!(self, RunEvent::Exit { .. })
    }
}
