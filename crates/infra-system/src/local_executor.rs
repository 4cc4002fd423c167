// Local shell executor - same contract as the ssh executor, no network hop
// Used for development setups and tests.

use crate::process::{signal_group, spawn_detached};
use async_trait::async_trait;
use bashpanel_core::domain::RunTarget;
use bashpanel_core::port::{ExecutionError, RemoteExecutor, RunningProcess, TerminationSignal};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

const DEFAULT_SHELL: &str = "sh";
/// Interpreter for stored scripts, as the ssh transport runs them
const SCRIPT_INTERPRETER: &str = "bash";

/// Runs targets through a local shell in a fresh process group
pub struct LocalShellExecutor {
    shell: String,
    script_interpreter: String,
    script_dir: PathBuf,
}

impl LocalShellExecutor {
    /// # Arguments
    /// * `script_dir` - Directory scripts are resolved against (the script store)
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            script_interpreter: SCRIPT_INTERPRETER.to_string(),
            script_dir: script_dir.into(),
        }
    }

    /// Use another program for both raw commands and scripts
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        let shell = shell.into();
        self.script_interpreter = shell.clone();
        self.shell = shell;
        self
    }

    fn command(&self, target: &RunTarget) -> Command {
        match target {
            RunTarget::Script(name) => {
                let mut command = Command::new(&self.script_interpreter);
                command.arg(self.script_dir.join(name.as_str()));
                command
            }
            RunTarget::Command(text) => {
                let mut command = Command::new(&self.shell);
                command.arg("-c").arg(text);
                command
            }
        }
    }
}

#[async_trait]
impl RemoteExecutor for LocalShellExecutor {
    async fn start(&self, target: &RunTarget) -> Result<RunningProcess, ExecutionError> {
        info!(shell = %self.shell, target = %target.label(), "Starting local run");
        spawn_detached(self.command(target))
    }

    fn terminate(&self, pgid: i32, signal: TerminationSignal) -> Result<(), ExecutionError> {
        signal_group(pgid, signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bashpanel_core::domain::{ExitStatus, ScriptName, StreamKind};
    use bashpanel_core::port::ProcessEvent;
    use std::time::Duration;

    async fn stdout_and_status(mut process: RunningProcess) -> (String, ExitStatus) {
        let mut out = String::new();
        while let Some(event) = process.events.recv().await {
            match event {
                ProcessEvent::Output(StreamKind::Stdout, data) => out.push_str(&data),
                ProcessEvent::Output(StreamKind::Stderr, _) => {}
                ProcessEvent::Exited(status) => return (out, status),
            }
        }
        panic!("no exit event");
    }

    #[tokio::test]
    async fn test_runs_raw_command() {
        let executor = LocalShellExecutor::new("/tmp");
        let process = executor
            .start(&RunTarget::Command("echo hi".to_string()))
            .await
            .unwrap();

        let (out, status) = stdout_and_status(process).await;
        assert_eq!(out, "hi\n");
        assert_eq!(status, ExitStatus::code(Some(0)));
    }

    #[tokio::test]
    async fn test_runs_stored_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.sh"), "echo \"from script\"\n").unwrap();

        let executor = LocalShellExecutor::new(dir.path());
        let target = RunTarget::Script(ScriptName::sanitize("greet").unwrap());
        let (out, status) = stdout_and_status(executor.start(&target).await.unwrap()).await;

        assert_eq!(out, "from script\n");
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_scripts_run_under_bash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("arrays.sh"),
            "items=(a b c)\nif [[ ${#items[@]} -eq 3 ]]; then echo \"${items[1]}\"; fi\n",
        )
        .unwrap();

        let executor = LocalShellExecutor::new(dir.path());
        let target = RunTarget::Script(ScriptName::sanitize("arrays").unwrap());
        let (out, status) = stdout_and_status(executor.start(&target).await.unwrap()).await;

        assert_eq!(out, "b\n");
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_ends_long_running_group() {
        let executor = LocalShellExecutor::new("/tmp");
        let process = executor
            .start(&RunTarget::Command("sleep 30; echo never".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        executor
            .terminate(process.pgid, TerminationSignal::Interrupt)
            .unwrap();

        let (out, status) = tokio::time::timeout(Duration::from_secs(5), stdout_and_status(process))
            .await
            .expect("group ignored SIGINT");
        assert_eq!(out, "");
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_finished_group_fails() {
        let executor = LocalShellExecutor::new("/tmp");
        let process = executor
            .start(&RunTarget::Command("true".to_string()))
            .await
            .unwrap();
        let pgid = process.pgid;
        let _ = stdout_and_status(process).await;

        assert!(matches!(
            executor.terminate(pgid, TerminationSignal::Interrupt),
            Err(ExecutionError::SignalFailed(_))
        ));
    }
}
