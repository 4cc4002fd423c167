//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::types::{
    CancelRequest, CancelResponse, GetScriptResponse, JoinRequest, ListRunsResponse,
    ListScriptsResponse, ScriptRequest, ScriptResponse, SubmitRequest, SubmitResponse,
    UploadScriptRequest,
};
use bashpanel_core::application::{self, RunService, ScriptService, Subscription};
use bashpanel_core::domain::RunId;
use bashpanel_core::error::AppError;
use jsonrpsee::types::error::INVALID_PARAMS_CODE;
use jsonrpsee::types::{ErrorObjectOwned, Params};
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage, SubscriptionSink};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a subscription handler (closes the subscription when it returns)
pub type SubscriptionResult = jsonrpsee::core::SubscriptionResult;

/// Decode method params
///
/// Accepts named params (`{...}`), a single positional object (`[{...}]`)
/// and no params at all (treated as `{}`).
pub fn parse_params<T: DeserializeOwned>(params: Params<'_>) -> Result<T, ErrorObjectOwned> {
    let value: Value = params.parse()?;
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        Value::Array(items) if items.is_empty() => Value::Object(Default::default()),
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };

    serde_json::from_value(value)
        .map_err(|e| ErrorObjectOwned::owned(INVALID_PARAMS_CODE, e.to_string(), None::<()>))
}

fn parse_run_id(raw: &str) -> Result<RunId, ErrorObjectOwned> {
    RunId::parse(raw).map_err(|e| to_rpc_error(e.into()))
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    runs: Arc<RunService>,
    scripts: Arc<ScriptService>,
}

impl RpcHandler {
    pub fn new(runs: Arc<RunService>, scripts: Arc<ScriptService>) -> Self {
        Self { runs, scripts }
    }

    /// run.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let run_id = self
            .runs
            .submit(application::SubmitRequest {
                script: params.script,
                command: params.command,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            run_id: run_id.to_string(),
        })
    }

    /// run.cancel.v1
    pub async fn cancel(&self, params: CancelRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        let run_id = parse_run_id(&params.run_id)?;
        self.runs.cancel(&run_id).await.map_err(to_rpc_error)?;

        Ok(CancelResponse {
            run_id: params.run_id,
            cancelled: true,
        })
    }

    /// run.list.v1
    pub async fn list_runs(&self) -> Result<ListRunsResponse, ErrorObjectOwned> {
        Ok(ListRunsResponse {
            runs: self.runs.list_runs().into_iter().map(Into::into).collect(),
        })
    }

    /// scripts.list.v1
    pub async fn list_scripts(&self) -> Result<ListScriptsResponse, ErrorObjectOwned> {
        let scripts = self.scripts.list().await.map_err(to_rpc_error)?;
        Ok(ListScriptsResponse {
            scripts: scripts.into_iter().map(|name| name.to_string()).collect(),
        })
    }

    /// scripts.get.v1
    pub async fn get_script(
        &self,
        params: ScriptRequest,
    ) -> Result<GetScriptResponse, ErrorObjectOwned> {
        let (name, content) = self
            .scripts
            .get(&params.filename)
            .await
            .map_err(to_rpc_error)?;

        Ok(GetScriptResponse {
            script: name.to_string(),
            content,
        })
    }

    /// scripts.upload.v1
    pub async fn upload_script(
        &self,
        params: UploadScriptRequest,
    ) -> Result<ScriptResponse, ErrorObjectOwned> {
        let name = self
            .scripts
            .upload(&params.filename, &params.content)
            .await
            .map_err(to_rpc_error)?;

        Ok(ScriptResponse {
            script: name.to_string(),
        })
    }

    /// scripts.delete.v1
    pub async fn delete_script(
        &self,
        params: ScriptRequest,
    ) -> Result<ScriptResponse, ErrorObjectOwned> {
        let name = self
            .scripts
            .delete(&params.filename)
            .await
            .map_err(to_rpc_error)?;

        Ok(ScriptResponse {
            script: name.to_string(),
        })
    }

    /// run.subscribe.v1
    ///
    /// Rejects unknown or malformed run ids before accepting. Once accepted,
    /// buffered output goes out first, then live chunks, then the exit event
    /// which ends the subscription.
    pub async fn subscribe(
        &self,
        params: JoinRequest,
        pending: PendingSubscriptionSink,
    ) -> SubscriptionResult {
        let joined = RunId::parse(&params.run_id)
            .map_err(AppError::from)
            .and_then(|run_id| self.runs.join(&run_id));

        let subscription = match joined {
            Ok(subscription) => subscription,
            Err(e) => {
                pending.reject(to_rpc_error(e)).await;
                return Ok(());
            }
        };

        let sink = pending.accept().await?;
        info!(run_id = %subscription.run_id(), "Subscriber joined run");
        forward_events(sink, subscription).await
    }
}

async fn forward_events(sink: SubscriptionSink, mut subscription: Subscription) -> SubscriptionResult {
    loop {
        tokio::select! {
            _ = sink.closed() => {
                debug!(run_id = %subscription.run_id(), "Subscriber disconnected");
                return Ok(());
            }
            event = subscription.next() => {
                let Some(event) = event else {
                    return Ok(());
                };
                let terminal = event.is_terminal();
                sink.send(SubscriptionMessage::from_json(&event)?).await?;
                if terminal {
                    debug!(run_id = %subscription.run_id(), "Exit delivered, closing subscription");
                    return Ok(());
                }
            }
        }
    }
}
