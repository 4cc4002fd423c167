// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod remote_executor;
pub mod script_store;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use remote_executor::{
    ExecutionError, ProcessEvent, RemoteExecutor, RunningProcess, TerminationSignal,
};
pub use script_store::ScriptStore;
pub use time_provider::TimeProvider;
