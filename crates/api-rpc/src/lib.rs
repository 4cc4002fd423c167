//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 over HTTP and WebSocket for the BashPanel daemon.
//! Run output is pushed through the `run.subscribe.v1` subscription.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use error::ServerError;
pub use server::{RpcServer, RpcServerConfig, RunningServer};
