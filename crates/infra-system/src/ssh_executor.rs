// SSH executor - runs targets on the configured host through the ssh client
// The remote host executes arbitrary content; callers are trusted operators.

use crate::process::{signal_group, spawn_detached};
use async_trait::async_trait;
use bashpanel_core::domain::RunTarget;
use bashpanel_core::port::{ExecutionError, RemoteExecutor, RunningProcess, TerminationSignal};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

const DEFAULT_SSH_BINARY: &str = "ssh";
const DEFAULT_SSH_HOST: &str = "localhost";
const DEFAULT_REMOTE_SCRIPT_DIR: &str = "~/bashpanel-scripts";

/// Remote channel settings (user/host/key triple plus options)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub ssh_binary: String,
    pub user: String,
    pub host: String,
    pub port: Option<u16>,
    pub key_path: PathBuf,
    /// Value for `-o StrictHostKeyChecking=`
    pub strict_host_key_checking: String,
    /// Request a remote tty (`-tt`, on by default)
    ///
    /// With a tty, sshd hangs up the remote session when the local client
    /// dies, so a cancel reaches the remote shell and its children. Remote
    /// stderr then arrives merged into stdout. Without it, cancelling only
    /// stops the local client and remote processes keep running.
    pub force_tty: bool,
    /// Directory on the remote host holding the stored scripts
    pub remote_script_dir: String,
}

impl SshConfig {
    pub fn new(user: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            ssh_binary: DEFAULT_SSH_BINARY.to_string(),
            user: user.into(),
            host: DEFAULT_SSH_HOST.to_string(),
            port: None,
            key_path: key_path.into(),
            strict_host_key_checking: "no".to_string(),
            force_tty: true,
            remote_script_dir: DEFAULT_REMOTE_SCRIPT_DIR.to_string(),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Remote executor over the `ssh` binary
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Command line the remote shell receives
    pub fn remote_command(&self, target: &RunTarget) -> String {
        match target {
            RunTarget::Script(name) => format!(
                "bash {}/{}",
                self.config.remote_script_dir.trim_end_matches('/'),
                name
            ),
            RunTarget::Command(command) => command.clone(),
        }
    }

    /// Full ssh argument vector (no local shell involved)
    pub fn build_args(&self, target: &RunTarget) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.config.key_path.display().to_string(),
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                self.config.strict_host_key_checking
            ),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];

        if let Some(port) = self.config.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if self.config.force_tty {
            args.push("-tt".to_string());
        }

        args.push(self.config.destination());
        args.push(self.remote_command(target));
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn start(&self, target: &RunTarget) -> Result<RunningProcess, ExecutionError> {
        info!(
            destination = %self.config.destination(),
            target = %target.label(),
            "Starting remote run over ssh"
        );

        let mut command = Command::new(&self.config.ssh_binary);
        command.args(self.build_args(target));
        spawn_detached(command)
    }

    fn terminate(&self, pgid: i32, signal: TerminationSignal) -> Result<(), ExecutionError> {
        signal_group(pgid, signal)
    }
}
