// Subscription Router - attaches join requests to relays

use crate::application::relay::{RelayHub, SubscriberId};
use crate::domain::{RunEvent, RunId};
use crate::error::{AppError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Routes join requests to the relay named by their run id
///
/// Joins for unknown run ids are rejected with NotFound. Relays are opened
/// before a run id is handed out, so an unknown id is forged, mistyped or
/// already disposed; there is no pending-creation window to wait for.
#[derive(Clone)]
pub struct SubscriptionRouter {
    hub: Arc<RelayHub>,
}

impl SubscriptionRouter {
    pub fn new(hub: Arc<RelayHub>) -> Self {
        Self { hub }
    }

    /// Attach a new subscriber to the run's relay
    ///
    /// Buffered output is already queued on the returned subscription.
    pub fn on_join(&self, run_id: &RunId) -> Result<Subscription> {
        let (sink, events) = mpsc::unbounded_channel();

        match self.hub.join(run_id, sink) {
            Some(subscriber_id) => {
                debug!(run_id = %run_id, subscriber_id, "Subscription attached");
                Ok(Subscription {
                    run_id: run_id.clone(),
                    subscriber_id,
                    events,
                    hub: self.hub.clone(),
                    finished: false,
                })
            }
            None => {
                warn!(run_id = %run_id, "Join for unknown run rejected");
                Err(AppError::NotFound(format!("unknown run {}", run_id)))
            }
        }
    }
}

/// One subscriber's view of a run
///
/// Dropping the subscription detaches it from the relay.
pub struct Subscription {
    run_id: RunId,
    subscriber_id: SubscriberId,
    events: mpsc::UnboundedReceiver<RunEvent>,
    hub: Arc<RelayHub>,
    finished: bool,
}

impl Subscription {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Next event; `None` after the exit event has been returned
    pub async fn next(&mut self) -> Option<RunEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await?;
        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.detach(&self.run_id, self.subscriber_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitStatus, StreamKind};
    use crate::port::id_provider::SequenceIdProvider;
    use crate::port::time_provider::SystemTimeProvider;

    fn setup() -> (Arc<RelayHub>, SubscriptionRouter) {
        let hub = Arc::new(RelayHub::new(Arc::new(SystemTimeProvider)));
        let router = SubscriptionRouter::new(hub.clone());
        (hub, router)
    }

    #[tokio::test]
    async fn test_join_unknown_run_is_not_found() {
        let (_hub, router) = setup();
        let result = router.on_join(&SequenceIdProvider::id_for_seed(1));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_subscription_ends_after_exit() {
        let (hub, router) = setup();
        let id = SequenceIdProvider::id_for_seed(1);
        hub.open(&id);
        hub.append(&id, StreamKind::Stdout, "hi\n".into());

        let mut sub = router.on_join(&id).unwrap();
        hub.mark_terminal(&id, ExitStatus::code(Some(0)));

        assert_eq!(
            sub.next().await,
            Some(RunEvent::output(StreamKind::Stdout, "hi\n"))
        );
        assert_eq!(
            sub.next().await,
            Some(RunEvent::Exit(ExitStatus::code(Some(0))))
        );
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_detaches_subscriber() {
        let (hub, router) = setup();
        let id = SequenceIdProvider::id_for_seed(1);
        hub.open(&id);

        let sub = router.on_join(&id).unwrap();
        assert_eq!(hub.subscriber_count(&id), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(&id), 0);
    }
}
