// Domain Layer - Pure business logic and entities

pub mod error;
pub mod run;
pub mod script;

// Re-exports
pub use error::DomainError;
pub use run::{ExitStatus, JobEntry, RunEvent, RunId, RunTarget, StreamKind};
pub use script::ScriptName;
