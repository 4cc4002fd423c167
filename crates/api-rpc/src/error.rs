//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use bashpanel_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error;
use tracing::error;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const STORE_ERROR: i32 = 5001;
    pub const EXECUTION_ERROR: i32 = 5002;
}

/// Failures while bringing the server up
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to build server on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Failed to register method {method}: {reason}")]
    Register { method: &'static str, reason: String },
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Store(msg) => {
            error!(error = %msg, "Script store failure");
            ErrorObjectOwned::owned(code::STORE_ERROR, msg, None::<()>)
        }
        AppError::Io(e) => {
            error!(error = %e, "I/O failure");
            ErrorObjectOwned::owned(code::STORE_ERROR, e.to_string(), None::<()>)
        }
        AppError::Execution(e) => {
            ErrorObjectOwned::owned(code::EXECUTION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Config(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
        AppError::Internal(msg) => {
            error!(error = %msg, "Internal failure");
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>)
        }
    }
}
