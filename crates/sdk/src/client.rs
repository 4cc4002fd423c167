//! BashPanel Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    CancelResponse, ListRunsResponse, ListScriptsResponse, RunEvent, RunRequest, RunSummary,
    ScriptContent, ScriptRequest, ScriptResponse, SubmitRequest, SubmitResponse,
    UploadScriptRequest,
};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use std::time::Duration;

const SUBSCRIBE_METHOD: &str = "run.subscribe.v1";
const UNSUBSCRIBE_METHOD: &str = "run.unsubscribe.v1";

/// BashPanel daemon client
///
/// Talks JSON-RPC over one WebSocket connection, which also carries run
/// output subscriptions.
///
/// # Example
///
/// ```no_run
/// use bashpanel_sdk::{BashPanelClient, RunEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = BashPanelClient::connect("ws://127.0.0.1:3001").await?;
/// let run_id = client.submit_command("uptime").await?;
///
/// let mut events = client.follow(&run_id).await?;
/// while let Some(event) = events.next().await {
///     if let RunEvent::Stdout { data } = event? {
///         print!("{}", data);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct BashPanelClient {
    client: WsClient,
}

impl BashPanelClient {
    /// Connect to the daemon
    ///
    /// # Arguments
    ///
    /// * `url` - WebSocket endpoint (e.g., `ws://127.0.0.1:3001`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let client = WsClientBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .build(url)
            .await
            .map_err(|e| SdkError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        Ok(Self { client })
    }

    /// Start a raw shell command, returns the run id
    pub async fn submit_command(&self, command: impl Into<String>) -> Result<String> {
        self.submit(SubmitRequest {
            script: None,
            command: Some(command.into()),
        })
        .await
    }

    /// Start a stored script by name, returns the run id
    pub async fn submit_script(&self, script: impl Into<String>) -> Result<String> {
        self.submit(SubmitRequest {
            script: Some(script.into()),
            command: None,
        })
        .await
    }

    async fn submit(&self, request: SubmitRequest) -> Result<String> {
        let response: SubmitResponse = self
            .client
            .request("run.submit.v1", rpc_params![request])
            .await?;
        Ok(response.run_id)
    }

    /// Interrupt a run's process group
    ///
    /// The exit still arrives through `follow`.
    pub async fn cancel(&self, run_id: impl Into<String>) -> Result<CancelResponse> {
        let request = RunRequest {
            run_id: run_id.into(),
        };
        let response: CancelResponse = self
            .client
            .request("run.cancel.v1", rpc_params![request])
            .await?;

        Ok(response)
    }

    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let response: ListRunsResponse = self.client.request("run.list.v1", rpc_params![]).await?;
        Ok(response.runs)
    }

    pub async fn list_scripts(&self) -> Result<Vec<String>> {
        let response: ListScriptsResponse = self
            .client
            .request("scripts.list.v1", rpc_params![])
            .await?;
        Ok(response.scripts)
    }

    pub async fn get_script(&self, filename: impl Into<String>) -> Result<ScriptContent> {
        let request = ScriptRequest {
            filename: filename.into(),
        };
        let response: ScriptContent = self
            .client
            .request("scripts.get.v1", rpc_params![request])
            .await?;
        Ok(response)
    }

    /// Store a script; returns the sanitized name it was stored under
    pub async fn upload_script(
        &self,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<String> {
        let request = UploadScriptRequest {
            filename: filename.into(),
            content: content.into(),
        };
        let response: ScriptResponse = self
            .client
            .request("scripts.upload.v1", rpc_params![request])
            .await?;
        Ok(response.script)
    }

    pub async fn delete_script(&self, filename: impl Into<String>) -> Result<String> {
        let request = ScriptRequest {
            filename: filename.into(),
        };
        let response: ScriptResponse = self
            .client
            .request("scripts.delete.v1", rpc_params![request])
            .await?;
        Ok(response.script)
    }

    /// Join a run's output
    ///
    /// Output produced before the first join is delivered first. Fails with
    /// a not-found error for unknown run ids.
    pub async fn follow(&self, run_id: impl Into<String>) -> Result<RunEventStream> {
        let request = RunRequest {
            run_id: run_id.into(),
        };
        let inner: Subscription<RunEvent> = self
            .client
            .subscribe(SUBSCRIBE_METHOD, rpc_params![request], UNSUBSCRIBE_METHOD)
            .await?;

        Ok(RunEventStream {
            inner,
            finished: false,
        })
    }
}

/// Output of a followed run, ending after the exit event
pub struct RunEventStream {
    inner: Subscription<RunEvent>,
    finished: bool,
}

impl RunEventStream {
    /// Next event; `None` once the exit event was returned or the connection closed
    pub async fn next(&mut self) -> Option<Result<RunEvent>> {
        if self.finished {
            return None;
        }

        match self.inner.next().await? {
            Ok(event) => {
                self.finished = event.is_exit();
                Some(Ok(event))
            }
            Err(e) => Some(Err(SdkError::Serialization(e))),
        }
    }

    /// Drain the stream, returning the exit event's code and error
    pub async fn wait(mut self) -> Result<(Option<i32>, Option<String>)> {
        while let Some(event) = self.next().await {
            if let RunEvent::Exit { code, error } = event? {
                return Ok((code, error));
            }
        }
        Err(SdkError::Connection(
            "subscription closed before the run exited".to_string(),
        ))
    }
}
