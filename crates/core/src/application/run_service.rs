// Run Service - job submission, output pumping and cancellation

use crate::application::constants::MAX_RUN_ID_ATTEMPTS;
use crate::application::registry::JobRegistry;
use crate::application::relay::RelayHub;
use crate::application::router::{Subscription, SubscriptionRouter};
use crate::domain::{ExitStatus, JobEntry, RunId, RunTarget};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, ProcessEvent, RemoteExecutor, ScriptStore, TerminationSignal, TimeProvider,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Submission parameters (script takes precedence over command)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

/// Coordinates executor, registry and relays for every run
pub struct RunService {
    executor: Arc<dyn RemoteExecutor>,
    scripts: Arc<dyn ScriptStore>,
    registry: Arc<JobRegistry>,
    relays: Arc<RelayHub>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    kill_grace: Option<Duration>,
}

impl RunService {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        scripts: Arc<dyn ScriptStore>,
        relays: Arc<RelayHub>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            executor,
            scripts,
            registry: Arc::new(JobRegistry::new()),
            relays,
            id_provider,
            time_provider,
            kill_grace: None,
        }
    }

    /// Escalate to SIGKILL when a cancelled group is still alive after `grace`
    pub fn with_kill_grace(mut self, grace: Option<Duration>) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn relays(&self) -> &Arc<RelayHub> {
        &self.relays
    }

    pub fn router(&self) -> SubscriptionRouter {
        SubscriptionRouter::new(self.relays.clone())
    }

    /// Start a run and return its id
    ///
    /// The id is returned as soon as input validation passes. A spawn
    /// failure is reported through the run's exit event, not as an error.
    ///
    /// # Errors
    /// - AppError::Domain for missing or invalid script/command
    /// - AppError::NotFound if the named script is not stored
    pub async fn submit(&self, req: SubmitRequest) -> Result<RunId> {
        let target = RunTarget::from_request(req.script.as_deref(), req.command.as_deref())?;

        if let RunTarget::Script(name) = &target {
            if !self.scripts.contains(name).await? {
                return Err(AppError::NotFound(format!("Script {} not found", name)));
            }
        }

        let run_id = self.allocate_run_id()?;
        let label = target.label();

        info!(run_id = %run_id, target = %label, "Starting run");

        match self.executor.start(&target).await {
            Ok(process) => {
                let entry = JobEntry {
                    run_id: run_id.clone(),
                    target: label,
                    pgid: process.pgid,
                    created_at: self.time_provider.now_millis(),
                };
                if let Err(e) = self.registry.create(entry) {
                    // Unreachable while ids come from allocate_run_id; never leak the group
                    error!(run_id = %run_id, error = ?e, "Registry rejected run, killing group");
                    let _ = self
                        .executor
                        .terminate(process.pgid, TerminationSignal::Kill);
                    self.relays
                        .mark_terminal(&run_id, ExitStatus::failed(e.to_string()));
                    return Ok(run_id);
                }

                tokio::spawn(pump_output(
                    self.registry.clone(),
                    self.relays.clone(),
                    run_id.clone(),
                    process.events,
                ));
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Run failed to spawn");
                self.relays
                    .mark_terminal(&run_id, ExitStatus::failed(e.to_string()));
            }
        }

        Ok(run_id)
    }

    /// Interrupt the run's whole process group
    ///
    /// Success means the signal was delivered; the exit still arrives
    /// through the run's subscription.
    ///
    /// # Errors
    /// - AppError::NotFound for an unknown run id
    /// - AppError::Conflict if the run already finished (and is still tracked)
    /// - AppError::Execution if the signal could not be delivered
    pub async fn cancel(&self, run_id: &RunId) -> Result<()> {
        let Some(entry) = self.registry.get(run_id) else {
            if self.relays.is_terminal(run_id) == Some(true) {
                return Err(AppError::Conflict(format!("run {} already finished", run_id)));
            }
            return Err(AppError::NotFound(format!("unknown run {}", run_id)));
        };

        self.executor
            .terminate(entry.pgid, TerminationSignal::Interrupt)
            .inspect_err(|e| {
                warn!(run_id = %run_id, pgid = entry.pgid, error = %e, "Cancel signal failed");
            })?;

        info!(run_id = %run_id, pgid = entry.pgid, "Interrupt sent to process group");

        if let Some(grace) = self.kill_grace {
            tokio::spawn(escalate_kill(
                self.executor.clone(),
                self.registry.clone(),
                run_id.clone(),
                entry.pgid,
                grace,
            ));
        }

        Ok(())
    }

    /// Attach a subscriber to the run's output
    pub fn join(&self, run_id: &RunId) -> Result<Subscription> {
        self.router().on_join(run_id)
    }

    /// Live runs, oldest first
    pub fn list_runs(&self) -> Vec<JobEntry> {
        self.registry.list()
    }

    /// Reserve a fresh run id by opening its relay
    fn allocate_run_id(&self) -> Result<RunId> {
        for _ in 0..MAX_RUN_ID_ATTEMPTS {
            let candidate = self.id_provider.generate_id();
            if !self.registry.contains(&candidate) && self.relays.open(&candidate) {
                return Ok(candidate);
            }
            warn!(run_id = %candidate, "Run id collision, regenerating");
        }
        Err(AppError::Internal(
            "could not allocate a unique run id".to_string(),
        ))
    }
}

/// Forward process events into the relay until exit
///
/// The registry entry is removed under the relay lock, right before the
/// exit is recorded. A subscriber that saw the exit never finds the run
/// still listed, and `cancel` never sees a run that is neither registered
/// nor terminal.
async fn pump_output(
    registry: Arc<JobRegistry>,
    relays: Arc<RelayHub>,
    run_id: RunId,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
) {
    let mut status = ExitStatus::failed("output stream closed without exit status");

    while let Some(event) = events.recv().await {
        match event {
            ProcessEvent::Output(kind, data) => {
                relays.append(&run_id, kind, data);
            }
            ProcessEvent::Exited(exit) => {
                status = exit;
                break;
            }
        }
    }

    relays.mark_terminal_with(&run_id, status.clone(), || {
        registry.remove(&run_id);
    });

    info!(
        run_id = %run_id,
        exit_code = ?status.code,
        error = ?status.error,
        "Run finished"
    );
}

async fn escalate_kill(
    executor: Arc<dyn RemoteExecutor>,
    registry: Arc<JobRegistry>,
    run_id: RunId,
    pgid: i32,
    grace: Duration,
) {
    tokio::time::sleep(grace).await;

    let still_running = registry
        .get(&run_id)
        .is_some_and(|entry| entry.pgid == pgid);
    if !still_running {
        return;
    }

    warn!(run_id = %run_id, pgid, "Process group ignored interrupt, sending SIGKILL");
    if let Err(e) = executor.terminate(pgid, TerminationSignal::Kill) {
        warn!(run_id = %run_id, pgid, error = %e, "SIGKILL failed");
    }
}
