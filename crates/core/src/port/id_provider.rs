// ID Provider Port (for deterministic testing)

use crate::domain::run::{RunId, RUN_ID_BYTES};
use rand::RngCore;

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new run ID
    fn generate_id(&self) -> RunId;
}

/// Random hex provider (production)
///
/// Draws from the thread-local CSPRNG so ids are unguessable.
pub struct RandomIdProvider;

impl IdProvider for RandomIdProvider {
    fn generate_id(&self) -> RunId {
        let mut bytes = [0u8; RUN_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        RunId::from_bytes(&bytes)
    }
}

/// Replays a fixed sequence of ids, then counts upward (tests only)
pub struct SequenceIdProvider {
    seeds: std::sync::Mutex<std::collections::VecDeque<u8>>,
    counter: std::sync::atomic::AtomicU64,
}

impl SequenceIdProvider {
    /// Ids built from repeated seed bytes, e.g. seed 1 -> "0101..."
    pub fn new(seeds: impl IntoIterator<Item = u8>) -> Self {
        Self {
            seeds: std::sync::Mutex::new(seeds.into_iter().collect()),
            counter: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn id_for_seed(seed: u8) -> RunId {
        RunId::from_bytes(&[seed; RUN_ID_BYTES])
    }
}

impl IdProvider for SequenceIdProvider {
    fn generate_id(&self) -> RunId {
        let seed = self
            .seeds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        match seed {
            Some(seed) => Self::id_for_seed(seed),
            None => {
                let n = self
                    .counter
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let mut bytes = [0u8; RUN_ID_BYTES];
                bytes[RUN_ID_BYTES - 8..].copy_from_slice(&n.to_be_bytes());
                RunId::from_bytes(&bytes)
            }
        }
    }
}
