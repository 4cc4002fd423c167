//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use bashpanel_core::domain::JobEntry;
use serde::{Deserialize, Serialize};

/// run.submit.v1 - Start a stored script or a raw command
///
/// `script` wins when both are given.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub run_id: String,
}

/// run.cancel.v1 - Interrupt a run's process group
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub run_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
}

/// run.subscribe.v1 - Join a run's output stream
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub run_id: String,
}

/// run.list.v1
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub target: String,
    pub pgid: i32,
    pub created_at: i64,
}

impl From<JobEntry> for RunSummary {
    fn from(entry: JobEntry) -> Self {
        Self {
            run_id: entry.run_id.to_string(),
            target: entry.target,
            pgid: entry.pgid,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<RunSummary>,
}

/// scripts.list.v1
#[derive(Debug, Clone, Serialize)]
pub struct ListScriptsResponse {
    pub scripts: Vec<String>,
}

/// scripts.get.v1 / scripts.delete.v1
#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetScriptResponse {
    pub script: String,
    pub content: String,
}

/// scripts.upload.v1
#[derive(Debug, Deserialize)]
pub struct UploadScriptRequest {
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

/// scripts.upload.v1 / scripts.delete.v1
#[derive(Debug, Clone, Serialize)]
pub struct ScriptResponse {
    pub script: String,
}
