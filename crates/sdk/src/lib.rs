//! BashPanel SDK - Rust Client Library
//!
//! Provides a convenient client for the BashPanel daemon: start stored
//! scripts or raw commands, follow their output, cancel them and manage the
//! script store.
//!
//! # Example
//!
//! ```no_run
//! use bashpanel_sdk::BashPanelClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BashPanelClient::connect("ws://127.0.0.1:3001").await?;
//!
//!     let script = client.upload_script("hello", "echo hello").await?;
//!     let run_id = client.submit_script(&script).await?;
//!     let (code, _) = client.follow(&run_id).await?.wait().await?;
//!
//!     println!("{} exited with {:?}", run_id, code);
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{BashPanelClient, RunEventStream};
pub use error::{code, Result, SdkError};
pub use types::{CancelResponse, RunEvent, RunSummary, ScriptContent};
