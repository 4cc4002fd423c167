// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Invalid script name: {0}")]
    InvalidScriptName(String),

    #[error("script or command required")]
    MissingTarget,
}

pub type Result<T> = std::result::Result<T, DomainError>;
