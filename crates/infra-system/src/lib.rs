// BashPanel Infrastructure - System Adapters
// Implements: RemoteExecutor (ssh, local shell), ScriptStore (filesystem)

pub mod fs_script_store;
pub mod local_executor;
pub mod process;
pub mod ssh_executor;

pub use fs_script_store::FsScriptStore;
pub use local_executor::LocalShellExecutor;
pub use ssh_executor::{SshConfig, SshExecutor};
