// Remote Executor Port
// Abstraction over the secure channel that runs a detached process group

use crate::domain::{ExitStatus, RunTarget, StreamKind};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Event produced by a running process, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One chunk read from stdout or stderr
    Output(StreamKind, String),
    /// Process finished; always the last event
    Exited(ExitStatus),
}

/// Handle to a freshly started process group
#[derive(Debug)]
pub struct RunningProcess {
    /// Process group id (equals the leader's pid)
    pub pgid: i32,
    /// Ordered output followed by exactly one `Exited`
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// Signal delivered to a whole process group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT, used for regular cancellation
    Interrupt,
    /// SIGKILL, used when a group ignores the interrupt
    Kill,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Signal delivery failed: {0}")]
    SignalFailed(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Remote Executor trait
///
/// Implementations:
/// - SshExecutor: runs the target on the configured host over ssh
/// - LocalShellExecutor: runs the target through `sh -c` on this machine
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Start the target as a detached process group
    ///
    /// Returns as soon as the process is spawned; output arrives on
    /// `RunningProcess::events`.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the channel cannot be launched
    async fn start(&self, target: &RunTarget) -> Result<RunningProcess, ExecutionError>;

    /// Deliver a signal to every process in the group
    ///
    /// Success means the signal was delivered, not that the group exited.
    ///
    /// # Errors
    /// - ExecutionError::SignalFailed if the group is gone or not signalable
    fn terminate(&self, pgid: i32, signal: TerminationSignal) -> Result<(), ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Emit the output, then exit with the code
        Finish {
            output: Vec<(StreamKind, String)>,
            code: i32,
        },
        /// Emit the output, then stay alive until signalled or finished
        Hang { output: Vec<(StreamKind, String)> },
        /// Fail to spawn with message
        FailSpawn(String),
    }

    /// Mock Remote Executor for testing
    ///
    /// Hanging processes can be driven from the test with `emit` and `finish`.
    pub struct MockRemoteExecutor {
        behavior: MockBehavior,
        fail_signals: bool,
        ignore_interrupt: bool,
        next_pgid: AtomicI32,
        live: Arc<Mutex<HashMap<i32, mpsc::UnboundedSender<ProcessEvent>>>>,
        signals: Arc<Mutex<Vec<(i32, TerminationSignal)>>>,
        started: Arc<Mutex<Vec<RunTarget>>>,
    }

    impl MockRemoteExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                fail_signals: false,
                ignore_interrupt: false,
                next_pgid: AtomicI32::new(1000),
                live: Arc::new(Mutex::new(HashMap::new())),
                signals: Arc::new(Mutex::new(Vec::new())),
                started: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_echo(text: impl Into<String>) -> Self {
            Self::new(MockBehavior::Finish {
                output: vec![(StreamKind::Stdout, text.into())],
                code: 0,
            })
        }

        pub fn new_hanging() -> Self {
            Self::new(MockBehavior::Hang { output: vec![] })
        }

        pub fn new_spawn_failure(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::FailSpawn(message.into()))
        }

        /// Every `terminate` call fails (group already gone)
        pub fn with_failing_signals(mut self) -> Self {
            self.fail_signals = true;
            self
        }

        /// SIGINT is recorded but does not end the process
        pub fn ignoring_interrupt(mut self) -> Self {
            self.ignore_interrupt = true;
            self
        }

        /// Push another output chunk from a hanging process
        pub fn emit(&self, pgid: i32, kind: StreamKind, data: impl Into<String>) -> bool {
            let live = self.live.lock().unwrap();
            match live.get(&pgid) {
                Some(tx) => tx.send(ProcessEvent::Output(kind, data.into())).is_ok(),
                None => false,
            }
        }

        /// Let a hanging process exit with the code
        pub fn finish(&self, pgid: i32, code: i32) -> bool {
            match self.live.lock().unwrap().remove(&pgid) {
                Some(tx) => tx
                    .send(ProcessEvent::Exited(ExitStatus::code(Some(code))))
                    .is_ok(),
                None => false,
            }
        }

        pub fn signals(&self) -> Vec<(i32, TerminationSignal)> {
            self.signals.lock().unwrap().clone()
        }

        pub fn started(&self) -> Vec<RunTarget> {
            self.started.lock().unwrap().clone()
        }

        pub fn live_count(&self) -> usize {
            self.live.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteExecutor for MockRemoteExecutor {
        async fn start(&self, target: &RunTarget) -> Result<RunningProcess, ExecutionError> {
            self.started.lock().unwrap().push(target.clone());

            let (tx, events) = mpsc::unbounded_channel();
            let pgid = self.next_pgid.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                MockBehavior::Finish { output, code } => {
                    for (kind, data) in output {
                        let _ = tx.send(ProcessEvent::Output(*kind, data.clone()));
                    }
                    let _ = tx.send(ProcessEvent::Exited(ExitStatus::code(Some(*code))));
                }
                MockBehavior::Hang { output } => {
                    for (kind, data) in output {
                        let _ = tx.send(ProcessEvent::Output(*kind, data.clone()));
                    }
                    self.live.lock().unwrap().insert(pgid, tx);
                }
                MockBehavior::FailSpawn(msg) => {
                    return Err(ExecutionError::SpawnFailed(msg.clone()));
                }
            }

            Ok(RunningProcess { pgid, events })
        }

        fn terminate(&self, pgid: i32, signal: TerminationSignal) -> Result<(), ExecutionError> {
            if self.fail_signals {
                return Err(ExecutionError::SignalFailed(format!(
                    "no such process group: {}",
                    pgid
                )));
            }

            self.signals.lock().unwrap().push((pgid, signal));

            if signal == TerminationSignal::Interrupt && self.ignore_interrupt {
                return Ok(());
            }

            let mut live = self.live.lock().unwrap();
            match live.remove(&pgid) {
                Some(tx) => {
                    let _ = tx.send(ProcessEvent::Exited(ExitStatus::code(None)));
                    Ok(())
                }
                None => Err(ExecutionError::SignalFailed(format!(
                    "no such process group: {}",
                    pgid
                ))),
            }
        }
    }
}
