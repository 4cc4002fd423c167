// Run Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::script::ScriptName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes behind a run id (hex encoded: 2 chars per byte)
pub const RUN_ID_BYTES: usize = 12;

/// Length of the textual run id
pub const RUN_ID_LEN: usize = RUN_ID_BYTES * 2;

/// Unguessable identifier of one execution instance
///
/// Always `RUN_ID_LEN` lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Parse an untrusted run id (client input)
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw.len() == RUN_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(DomainError::InvalidRunId(raw.to_string()))
        }
    }

    /// Build a run id from raw random bytes
    pub fn from_bytes(bytes: &[u8; RUN_ID_BYTES]) -> Self {
        let mut id = String::with_capacity(RUN_ID_LEN);
        for b in bytes {
            id.push_str(&format!("{:02x}", b));
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// What to execute on the remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// Stored script, referenced by its sanitized name
    Script(ScriptName),
    /// Raw command text handed to the remote shell
    Command(String),
}

impl RunTarget {
    /// Resolve a submission into a target
    ///
    /// Script takes precedence over command; blank values count as absent.
    pub fn from_request(script: Option<&str>, command: Option<&str>) -> Result<Self> {
        if let Some(script) = script.filter(|s| !s.trim().is_empty()) {
            return ScriptName::sanitize(script)
                .map(RunTarget::Script)
                .ok_or_else(|| DomainError::InvalidScriptName(script.to_string()));
        }

        match command.filter(|c| !c.trim().is_empty()) {
            Some(command) => Ok(RunTarget::Command(command.to_string())),
            None => Err(DomainError::MissingTarget),
        }
    }

    /// Short human readable label (used in listings and logs)
    pub fn label(&self) -> String {
        match self {
            RunTarget::Script(name) => format!("script:{}", name),
            RunTarget::Command(command) => format!("command:{}", command),
        }
    }
}

/// Output stream of the remote process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Final outcome of a run
///
/// `code` is `None` when the process was terminated by a signal.
/// `error` is set when the process could not be spawned or its output failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExitStatus {
    pub fn code(code: Option<i32>) -> Self {
        Self { code, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            code: None,
            error: Some(error.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && self.error.is_none()
    }
}

/// Event pushed to subscribers of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RunEvent {
    Stdout { data: String },
    Stderr { data: String },
    Exit(ExitStatus),
}

impl RunEvent {
    pub fn output(kind: StreamKind, data: impl Into<String>) -> Self {
        match kind {
            StreamKind::Stdout => RunEvent::Stdout { data: data.into() },
            StreamKind::Stderr => RunEvent::Stderr { data: data.into() },
        }
    }

    /// True for the single event that closes a run's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Exit(_))
    }
}

/// Live job tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEntry {
    pub run_id: RunId,
    pub target: String,
    pub pgid: i32,
    pub created_at: i64, // epoch ms
}
