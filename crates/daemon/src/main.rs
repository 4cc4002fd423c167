//! BashPanel - Main Entry Point
//! JSON-RPC server + remote runs over ssh (or a local shell)

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// Import workspace crates
use bashpanel_api_rpc::RpcServer;
use bashpanel_core::application::{
    shutdown_channel, RelayHub, RelaySweeper, RunService, ScriptService,
};
use bashpanel_core::port::id_provider::RandomIdProvider;
use bashpanel_core::port::time_provider::SystemTimeProvider;
use bashpanel_core::port::RemoteExecutor;
use bashpanel_infra_system::{FsScriptStore, LocalShellExecutor, SshExecutor};
use config::{DaemonConfig, Transport};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    telemetry::init_tracing()?;

    info!("BashPanel v{} starting...", VERSION);

    // 2. Load configuration (missing ssh credentials end the process here)
    let config = DaemonConfig::from_env().inspect_err(|e| {
        error!(error = %e, "Invalid configuration, refusing to start");
    })?;

    // 3. Script store
    let store = Arc::new(
        FsScriptStore::open(&config.scripts_dir)
            .await
            .with_context(|| format!("script store at {}", config.scripts_dir.display()))?,
    );
    info!(scripts_dir = %store.dir().display(), "Script store ready");

    // 4. Setup dependencies (DI wiring)
    let executor: Arc<dyn RemoteExecutor> = match &config.transport {
        Transport::Ssh(ssh) => {
            info!(user = %ssh.user, host = %ssh.host, "Using ssh transport");
            Arc::new(SshExecutor::new(ssh.clone()))
        }
        Transport::Local => {
            warn!("Using local shell transport (runs execute on this machine)");
            Arc::new(LocalShellExecutor::new(store.dir()))
        }
    };

    let time_provider = Arc::new(SystemTimeProvider);
    let relays = Arc::new(RelayHub::new(time_provider.clone()));
    let runs = Arc::new(
        RunService::new(
            executor,
            store.clone(),
            relays.clone(),
            Arc::new(RandomIdProvider),
            time_provider,
        )
        .with_kill_grace(config.kill_grace),
    );
    let scripts = Arc::new(ScriptService::new(store));

    // 5. Relay sweeper
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let sweeper = RelaySweeper::new(relays, config.relay_retention);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    // 6. Start JSON-RPC server
    let server = RpcServer::new(config.rpc.clone(), runs.clone(), scripts)
        .start()
        .await?;

    info!(url = %server.ws_url(), "System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    shutdown_tx.shutdown();
    server
        .handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, sweeper_handle).await;

    let live = runs.list_runs().len();
    if live > 0 {
        warn!(live_runs = live, "Detached runs keep running after shutdown");
    }

    info!("Shutdown complete.");

    Ok(())
}
