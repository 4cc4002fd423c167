// Detached process groups: spawning, output forwarding, group signalling
// reason: tokio for async process management, nix for killpg

use bashpanel_core::domain::{ExitStatus, StreamKind};
use bashpanel_core::port::{ExecutionError, ProcessEvent, RunningProcess, TerminationSignal};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bytes read from a pipe per chunk
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Spawn `command` as the leader of a new process group
///
/// Output chunks are forwarded in arrival order; the `Exited` event is sent
/// only after both pipes reached EOF and the leader was reaped.
pub fn spawn_detached(mut command: Command) -> Result<RunningProcess, ExecutionError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

    let pgid = child
        .id()
        .and_then(|pid| i32::try_from(pid).ok())
        .ok_or_else(|| ExecutionError::SpawnFailed("child has no pid".to_string()))?;

    info!(pgid, "Spawned detached process group");

    let (tx, events) = mpsc::unbounded_channel();

    let stdout = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(forward(pipe, StreamKind::Stdout, tx.clone())));
    let stderr = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(forward(pipe, StreamKind::Stderr, tx.clone())));

    tokio::spawn(async move {
        let mut stream_error = None;
        for task in [stdout, stderr].into_iter().flatten() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => stream_error = Some(format!("output stream failed: {}", e)),
                Err(e) => stream_error = Some(format!("output reader panicked: {}", e)),
            }
        }

        let status = match child.wait().await {
            Ok(status) => ExitStatus {
                code: status.code(),
                error: stream_error,
            },
            Err(e) => ExitStatus::failed(format!("wait failed: {}", e)),
        };

        debug!(pgid, exit_code = ?status.code, "Process group leader exited");
        let _ = tx.send(ProcessEvent::Exited(status));
    });

    Ok(RunningProcess { pgid, events })
}

/// Copy one pipe into the event channel until EOF
async fn forward<R>(
    mut reader: R,
    kind: StreamKind,
    tx: mpsc::UnboundedSender<ProcessEvent>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut pending = Vec::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);

        let chunk = take_utf8_prefix(&mut pending);
        if !chunk.is_empty() {
            // keep draining even without a listener so the child never blocks
            let _ = tx.send(ProcessEvent::Output(kind, chunk));
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(ProcessEvent::Output(
            kind,
            String::from_utf8_lossy(&pending).into_owned(),
        ));
    }

    Ok(())
}

/// Decode everything up to a trailing, incomplete UTF-8 sequence
///
/// The incomplete tail stays in `pending` for the next read.
pub(crate) fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(&pending[..]) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let tail = pending.split_off(e.valid_up_to());
            let text = String::from_utf8_lossy(pending).into_owned();
            *pending = tail;
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

/// Send a signal to every member of a process group (negative pid)
pub fn signal_group(pgid: i32, signal: TerminationSignal) -> Result<(), ExecutionError> {
    // 0 and 1 would address our own group or init
    if pgid <= 1 {
        return Err(ExecutionError::SignalFailed(format!(
            "refusing to signal process group {}",
            pgid
        )));
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let sig = match signal {
            TerminationSignal::Interrupt => Signal::SIGINT,
            TerminationSignal::Kill => Signal::SIGKILL,
        };

        info!(pgid, signal = sig.as_str(), "Signalling process group");
        killpg(Pid::from_raw(pgid), sig).map_err(|e| {
            warn!(pgid, signal = sig.as_str(), error = %e, "Process group signal failed");
            ExecutionError::SignalFailed(format!("{} to process group {}: {}", sig.as_str(), pgid, e))
        })
    }

    #[cfg(not(unix))]
    {
        let _ = signal;
        Err(ExecutionError::SignalFailed(
            "process groups are not supported on this platform".to_string(),
        ))
    }
}
