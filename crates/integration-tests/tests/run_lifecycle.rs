//! Run lifecycle against real process groups
//!
//! Wires RunService to the local shell executor and the filesystem script
//! store, then checks the observable behaviour of submit, join and cancel.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use bashpanel_core::application::{RelayHub, RunService, ScriptService, SubmitRequest, Subscription};
use bashpanel_core::domain::{ExitStatus, RunEvent, RunId};
use bashpanel_core::error::AppError;
use bashpanel_core::port::id_provider::RandomIdProvider;
use bashpanel_core::port::time_provider::SystemTimeProvider;
use bashpanel_infra_system::{FsScriptStore, LocalShellExecutor};
use tempfile::TempDir;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

struct Harness {
    runs: RunService,
    scripts: ScriptService,
    _dir: TempDir,
}

async fn harness_with(configure: impl FnOnce(LocalShellExecutor) -> LocalShellExecutor) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsScriptStore::open(dir.path()).await.unwrap());
    let executor = configure(LocalShellExecutor::new(dir.path()));
    let time = Arc::new(SystemTimeProvider);

    let runs = RunService::new(
        Arc::new(executor),
        store.clone(),
        Arc::new(RelayHub::new(time.clone())),
        Arc::new(RandomIdProvider),
        time,
    );

    Harness {
        runs,
        scripts: ScriptService::new(store),
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(|executor| executor).await
}

fn command(cmd: &str) -> SubmitRequest {
    SubmitRequest {
        script: None,
        command: Some(cmd.to_string()),
    }
}

async fn collect(mut sub: Subscription) -> Vec<RunEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        let mut events = vec![];
        while let Some(event) = sub.next().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("run did not exit in time")
}

fn stdout_of(events: &[RunEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Stdout { data } => Some(data.as_str()),
            _ => None,
        })
        .collect()
}

fn exit_of(events: &[RunEvent]) -> &ExitStatus {
    match events.last() {
        Some(RunEvent::Exit(status)) => status,
        other => panic!("last event is not exit: {:?}", other),
    }
}

#[tokio::test]
async fn test_echo_hi_delivers_output_then_exit() {
    let h = harness().await;

    let run_id = h.runs.submit(command("echo hi")).await.unwrap();
    let events = collect(h.runs.join(&run_id).unwrap()).await;

    assert_eq!(
        events,
        vec![
            RunEvent::Stdout {
                data: "hi\n".to_string()
            },
            RunEvent::Exit(ExitStatus::code(Some(0))),
        ]
    );
    assert!(h.runs.list_runs().is_empty());
}

#[tokio::test]
async fn test_output_order_is_preserved() {
    let h = harness().await;

    let run_id = h
        .runs
        .submit(command("for i in 1 2 3 4 5; do echo $i; sleep 0.05; done"))
        .await
        .unwrap();
    let events = collect(h.runs.join(&run_id).unwrap()).await;

    assert_eq!(stdout_of(&events), "1\n2\n3\n4\n5\n");
    assert!(exit_of(&events).success());
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_stderr_and_exit_code() {
    let h = harness().await;

    let run_id = h
        .runs
        .submit(command("echo out; echo err >&2; exit 4"))
        .await
        .unwrap();
    let events = collect(h.runs.join(&run_id).unwrap()).await;

    assert!(events.contains(&RunEvent::Stderr {
        data: "err\n".to_string()
    }));
    assert_eq!(stdout_of(&events), "out\n");
    assert_eq!(exit_of(&events).code, Some(4));
}

#[tokio::test]
async fn test_uploaded_script_runs() {
    let h = harness().await;

    let name = h
        .scripts
        .upload("greet", "echo hello\n")
        .await
        .unwrap();
    assert_eq!(name.as_str(), "greet.sh");

    let run_id = h
        .runs
        .submit(SubmitRequest {
            script: Some("greet".to_string()),
            command: Some("echo ignored".to_string()),
        })
        .await
        .unwrap();
    let events = collect(h.runs.join(&run_id).unwrap()).await;

    assert_eq!(stdout_of(&events), "hello\n");
    assert!(exit_of(&events).success());
}

#[tokio::test]
async fn test_unknown_script_is_rejected_before_spawn() {
    let h = harness().await;

    let result = h
        .runs
        .submit(SubmitRequest {
            script: Some("missing".to_string()),
            command: None,
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(h.runs.list_runs().is_empty());
}

#[tokio::test]
async fn test_traversal_upload_stays_in_store() {
    let h = harness().await;

    let name = h
        .scripts
        .upload("../../etc/passwd", "echo nope")
        .await
        .unwrap();

    assert_eq!(name.as_str(), "passwd.sh");
    assert_eq!(h.scripts.list().await.unwrap(), vec![name]);
}

#[tokio::test]
async fn test_cancel_interrupts_whole_group() {
    let h = harness().await;

    // every pipeline member shares the shell's process group
    let run_id = h
        .runs
        .submit(command("sleep 30 | cat; echo never"))
        .await
        .unwrap();
    let sub = h.runs.join(&run_id).unwrap();
    assert_eq!(h.runs.list_runs().len(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    h.runs.cancel(&run_id).await.unwrap();

    let events = collect(sub).await;
    assert_eq!(stdout_of(&events), "");
    assert!(!exit_of(&events).success());
    assert!(h.runs.list_runs().is_empty());
}

#[tokio::test]
async fn test_kill_grace_escalates_when_interrupt_is_ignored() {
    let h = harness().await;
    let runs = h.runs.with_kill_grace(Some(Duration::from_millis(200)));

    let run_id = runs
        .submit(command("trap '' INT; sleep 30"))
        .await
        .unwrap();
    let sub = runs.join(&run_id).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    runs.cancel(&run_id).await.unwrap();

    let events = collect(sub).await;
    assert_eq!(exit_of(&events).code, None);
    assert!(runs.list_runs().is_empty());
}

#[tokio::test]
async fn test_cancel_unknown_and_finished_runs() {
    let h = harness().await;

    let unknown = RunId::parse(&"0".repeat(24)).unwrap();
    assert!(matches!(
        h.runs.cancel(&unknown).await,
        Err(AppError::NotFound(_))
    ));

    let run_id = h.runs.submit(command("true")).await.unwrap();
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !h.runs.list_runs().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("run did not exit in time");

    // finished but never joined: output is still held
    assert!(matches!(
        h.runs.cancel(&run_id).await,
        Err(AppError::Conflict(_))
    ));

    // draining the output disposes the run
    collect(h.runs.join(&run_id).unwrap()).await;
    assert!(matches!(
        h.runs.cancel(&run_id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_join_unknown_run_is_not_found() {
    let h = harness().await;
    let unknown = RunId::parse(&"f".repeat(24)).unwrap();

    assert!(matches!(h.runs.join(&unknown), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_spawn_failure_surfaces_as_exit_error() {
    let h = harness_with(|executor| executor.with_shell("/nonexistent/shell")).await;

    let run_id = h.runs.submit(command("echo hi")).await.unwrap();
    let events = collect(h.runs.join(&run_id).unwrap()).await;

    assert_eq!(events.len(), 1);
    let status = exit_of(&events);
    assert_eq!(status.code, None);
    assert!(status.error.is_some());
    assert!(h.runs.list_runs().is_empty());
}
