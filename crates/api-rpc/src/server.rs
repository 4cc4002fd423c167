//! JSON-RPC Server
//!
//! Serves HTTP and WebSocket on one TCP port. Subscriptions need WebSocket.

use crate::error::ServerError;
use crate::handler::{parse_params, RpcHandler};
use crate::types::{
    CancelRequest, JoinRequest, ScriptRequest, SubmitRequest, UploadScriptRequest,
};
use bashpanel_core::application::{RunService, ScriptService};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 3001;

pub const SUBSCRIBE_METHOD: &str = "run.subscribe.v1";
pub const UNSUBSCRIBE_METHOD: &str = "run.unsubscribe.v1";
pub const EVENT_NOTIFICATION: &str = "run.event";

/// RPC Server Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcServerConfig {
    pub host: String,
    /// 0 picks a free port (see `RunningServer::local_addr`)
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// Handle to a started server
pub struct RunningServer {
    pub handle: ServerHandle,
    pub local_addr: SocketAddr,
}

impl RunningServer {
    /// `ws://` URL clients can connect to
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }
}

fn register_err<E: std::fmt::Display>(method: &'static str) -> impl FnOnce(E) -> ServerError {
    move |e| ServerError::Register {
        method,
        reason: e.to_string(),
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        runs: Arc<RunService>,
        scripts: Arc<ScriptService>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(runs, scripts)),
        }
    }

    /// Start the JSON-RPC server
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = server.local_addr().map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        let module = self.module()?;
        let handle = server.start(module);

        info!(
            addr = %local_addr,
            "JSON-RPC server started (HTTP + WebSocket)"
        );

        Ok(RunningServer { handle, local_addr })
    }

    fn module(&self) -> Result<RpcModule<()>, ServerError> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("run.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = parse_params(params)?;
                    handler.submit(req).await
                }
            })
            .map_err(register_err("run.submit.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("run.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CancelRequest = parse_params(params)?;
                    handler.cancel(req).await
                }
            })
            .map_err(register_err("run.cancel.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("run.list.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.list_runs().await }
            })
            .map_err(register_err("run.list.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("scripts.list.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.list_scripts().await }
            })
            .map_err(register_err("scripts.list.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("scripts.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScriptRequest = parse_params(params)?;
                    handler.get_script(req).await
                }
            })
            .map_err(register_err("scripts.get.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("scripts.upload.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UploadScriptRequest = parse_params(params)?;
                    handler.upload_script(req).await
                }
            })
            .map_err(register_err("scripts.upload.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("scripts.delete.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScriptRequest = parse_params(params)?;
                    handler.delete_script(req).await
                }
            })
            .map_err(register_err("scripts.delete.v1"))?;

        // Join: output is pushed as `run.event` notifications
        let handler = self.handler.clone();
        module
            .register_subscription(
                SUBSCRIBE_METHOD,
                EVENT_NOTIFICATION,
                UNSUBSCRIBE_METHOD,
                move |params, pending, _, _| {
                    let handler = handler.clone();
                    async move {
                        let req: JoinRequest = match parse_params(params) {
                            Ok(req) => req,
                            Err(e) => {
                                pending.reject(e).await;
                                return Ok(());
                            }
                        };
                        handler.subscribe(req, pending).await
                    }
                },
            )
            .map_err(register_err(SUBSCRIBE_METHOD))?;

        Ok(module)
    }
}
