// Relay Sweeper
// Disposes output of finished runs that no subscriber ever claimed

use crate::application::constants::MIN_SWEEP_INTERVAL;
use crate::application::relay::RelayHub;
use crate::application::shutdown::ShutdownToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

/// Relay sweeper
///
/// Runs `RelayHub::sweep` every quarter of the retention window.
pub struct RelaySweeper {
    relays: Arc<RelayHub>,
    retention: Duration,
}

impl RelaySweeper {
    pub fn new(relays: Arc<RelayHub>, retention: Duration) -> Self {
        Self { relays, retention }
    }

    pub fn sweep_interval(&self) -> Duration {
        (self.retention / 4).max(MIN_SWEEP_INTERVAL)
    }

    /// Run one sweep immediately
    pub fn run_once(&self) -> usize {
        self.relays.sweep(self.retention.as_millis() as i64)
    }

    /// Sweep loop (background task), stops on shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            retention_secs = self.retention.as_secs(),
            "Relay sweeper started"
        );

        let mut tick = interval(self.sweep_interval());

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_once();
                }
                _ = shutdown.wait() => {
                    info!("Relay sweeper stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shutdown::shutdown_channel;
    use crate::domain::ExitStatus;
    use crate::port::id_provider::SequenceIdProvider;
    use crate::port::time_provider::ManualTimeProvider;

    #[test]
    fn test_sweep_interval_has_floor() {
        let hub = Arc::new(RelayHub::new(Arc::new(ManualTimeProvider::new(0))));
        let sweeper = RelaySweeper::new(hub.clone(), Duration::from_millis(100));
        assert_eq!(sweeper.sweep_interval(), MIN_SWEEP_INTERVAL);

        let sweeper = RelaySweeper::new(hub, Duration::from_secs(400));
        assert_eq!(sweeper.sweep_interval(), Duration::from_secs(100));
    }

    #[test]
    fn test_run_once_disposes_expired() {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let hub = Arc::new(RelayHub::new(clock.clone()));
        let id = SequenceIdProvider::id_for_seed(1);
        hub.open(&id);
        hub.mark_terminal(&id, ExitStatus::code(Some(0)));

        let sweeper = RelaySweeper::new(hub.clone(), Duration::from_secs(60));
        assert_eq!(sweeper.run_once(), 0);

        clock.advance(61_000);
        assert_eq!(sweeper.run_once(), 1);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let hub = Arc::new(RelayHub::new(Arc::new(ManualTimeProvider::new(0))));
        let sweeper = RelaySweeper::new(hub, Duration::from_secs(60));
        let (tx, token) = shutdown_channel();

        let handle = tokio::spawn(sweeper.run(token));
        tx.shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
