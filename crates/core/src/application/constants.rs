// Application constants (no magic values)
use std::time::Duration;

/// Attempts at drawing an unused run id before giving up
pub const MAX_RUN_ID_ATTEMPTS: usize = 8;

/// How long a finished run nobody joined keeps its output (5 minutes)
pub const DEFAULT_RELAY_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Lower bound for the relay sweep interval
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
