// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod registry;
pub mod relay;
pub mod router;
pub mod run_service;
pub mod scripts;
pub mod shutdown;
pub mod sweeper;

// Re-exports
pub use registry::JobRegistry;
pub use relay::{Delivery, EventSink, RelayHub, SubscriberId};
pub use router::{Subscription, SubscriptionRouter};
pub use run_service::{RunService, SubmitRequest};
pub use scripts::ScriptService;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use sweeper::RelaySweeper;
