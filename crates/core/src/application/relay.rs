// Output Relay - per-run buffer + broadcast
//
// Output produced before the first subscriber joins is buffered and flushed
// to that subscriber on join. Later output is broadcast to every attached
// subscriber. Subscribers joining after the flush get no replay.

use crate::domain::{ExitStatus, RunEvent, RunId, StreamKind};
use crate::port::TimeProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Channel end that receives a subscriber's events
pub type EventSink = mpsc::UnboundedSender<RunEvent>;

/// Identifies one attached subscriber within the hub
pub type SubscriberId = u64;

/// What happened to an appended chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// No subscriber attached; kept for the first joiner
    Buffered,
    /// Sent to this many subscribers
    Broadcast(usize),
    /// Relay unknown or already terminal
    Dropped,
}

#[derive(Default)]
struct Relay {
    buffer: Vec<RunEvent>,
    subscribers: Vec<(SubscriberId, EventSink)>,
    terminal: Option<ExitStatus>,
    terminated_at: Option<i64>,
}

impl Relay {
    fn prune_closed(&mut self) {
        self.subscribers.retain(|(_, sink)| !sink.is_closed());
    }
}

/// All relays, keyed by run id
pub struct RelayHub {
    relays: Mutex<HashMap<RunId, Relay>>,
    next_subscriber: AtomicU64,
    time_provider: Arc<dyn TimeProvider>,
}

impl RelayHub {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            relays: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
            time_provider,
        }
    }

    fn relays(&self) -> MutexGuard<'_, HashMap<RunId, Relay>> {
        self.relays.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty relay in buffering mode
    ///
    /// Returns false if a relay for this run id already exists.
    pub fn open(&self, run_id: &RunId) -> bool {
        let mut relays = self.relays();
        if relays.contains_key(run_id) {
            return false;
        }
        relays.insert(run_id.clone(), Relay::default());
        true
    }

    pub fn contains(&self, run_id: &RunId) -> bool {
        self.relays().contains_key(run_id)
    }

    /// `Some(true)` once the run's exit has been recorded but not yet flushed
    pub fn is_terminal(&self, run_id: &RunId) -> Option<bool> {
        self.relays()
            .get(run_id)
            .map(|relay| relay.terminal.is_some())
    }

    pub fn subscriber_count(&self, run_id: &RunId) -> usize {
        self.relays()
            .get(run_id)
            .map(|relay| relay.subscribers.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.relays().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record one output chunk
    pub fn append(&self, run_id: &RunId, kind: StreamKind, data: String) -> Delivery {
        let mut relays = self.relays();
        let Some(relay) = relays.get_mut(run_id) else {
            return Delivery::Dropped;
        };

        if relay.terminal.is_some() {
            debug!(run_id = %run_id, stream = %kind, "Dropping output after exit");
            return Delivery::Dropped;
        }

        let event = RunEvent::output(kind, data);

        relay.prune_closed();
        if relay.subscribers.is_empty() {
            relay.buffer.push(event);
            return Delivery::Buffered;
        }

        for (_, sink) in &relay.subscribers {
            let _ = sink.send(event.clone());
        }
        Delivery::Broadcast(relay.subscribers.len())
    }

    /// Attach a subscriber and flush any buffered output to it
    ///
    /// Returns `None` when no relay exists for the run id. If the run has
    /// already exited, the subscriber receives the buffer followed by the
    /// exit event and the relay is disposed.
    pub fn join(&self, run_id: &RunId, sink: EventSink) -> Option<SubscriberId> {
        let mut relays = self.relays();
        let relay = relays.get_mut(run_id)?;

        let subscriber_id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);

        // Already gone: keep the buffer for someone who is still listening
        if sink.is_closed() {
            return Some(subscriber_id);
        }

        let flushed = relay.buffer.len();
        for event in relay.buffer.drain(..) {
            let _ = sink.send(event);
        }

        if let Some(status) = relay.terminal.clone() {
            let _ = sink.send(RunEvent::Exit(status));
            relays.remove(run_id);
            debug!(run_id = %run_id, flushed, "Late subscriber drained finished run");
            return Some(subscriber_id);
        }

        relay.subscribers.push((subscriber_id, sink));
        debug!(
            run_id = %run_id,
            subscriber_id,
            flushed,
            subscribers = relay.subscribers.len(),
            "Subscriber joined"
        );
        Some(subscriber_id)
    }

    /// Detach a subscriber (transport closed)
    ///
    /// With no subscribers left, a still-running relay buffers again.
    pub fn detach(&self, run_id: &RunId, subscriber_id: SubscriberId) {
        let mut relays = self.relays();
        if let Some(relay) = relays.get_mut(run_id) {
            relay.subscribers.retain(|(id, _)| *id != subscriber_id);
            if relay.subscribers.is_empty() {
                debug!(run_id = %run_id, "Last subscriber left, buffering resumed");
            }
        }
    }

    /// Record the run's exit and notify subscribers
    ///
    /// Returns false if the relay is unknown or already terminal, so the
    /// exit event is delivered exactly once.
    pub fn mark_terminal(&self, run_id: &RunId, status: ExitStatus) -> bool {
        self.mark_terminal_with(run_id, status, || {})
    }

    /// `mark_terminal`, running `on_exit` under the hub lock first
    ///
    /// Anything `on_exit` changes becomes visible together with the
    /// terminal flag: a reader that then checks `is_terminal` waits for
    /// both. `on_exit` runs even if the relay is unknown and must not call
    /// back into the hub.
    pub fn mark_terminal_with(
        &self,
        run_id: &RunId,
        status: ExitStatus,
        on_exit: impl FnOnce(),
    ) -> bool {
        let mut relays = self.relays();
        on_exit();

        let Some(relay) = relays.get_mut(run_id) else {
            return false;
        };
        if relay.terminal.is_some() {
            return false;
        }

        relay.prune_closed();
        if relay.subscribers.is_empty() {
            // Nobody listening yet: retain until the first join or the sweeper
            relay.terminal = Some(status);
            relay.terminated_at = Some(self.time_provider.now_millis());
            debug!(run_id = %run_id, buffered = relay.buffer.len(), "Run exited before any subscriber");
            return true;
        }

        for (_, sink) in &relay.subscribers {
            let _ = sink.send(RunEvent::Exit(status.clone()));
        }
        relays.remove(run_id);
        true
    }

    /// Dispose terminal relays nobody joined within `retention_ms`
    pub fn sweep(&self, retention_ms: i64) -> usize {
        let cutoff = self.time_provider.now_millis() - retention_ms;
        let mut relays = self.relays();
        let before = relays.len();
        relays.retain(|_, relay| match relay.terminated_at {
            Some(at) => at > cutoff,
            None => true,
        });
        let removed = before - relays.len();
        if removed > 0 {
            info!(removed, "Disposed unclaimed finished relays");
        }
        removed
    }
}
