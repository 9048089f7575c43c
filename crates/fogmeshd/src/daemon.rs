//! Daemon wiring: builds every subsystem from the configuration and runs
//! them until a shutdown signal arrives.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use fogmesh_core::FogConfig;
use fogmesh_deploy::{Manager, ManagerConfig, NodeInventory, PlatformProvisioner};
use fogmesh_placement::Resolver;
use fogmesh_platform::Kubectl;
use fogmesh_watcher::InfrastructureWatcher;

/// Load the configuration file (or defaults) and apply CLI overrides.
pub fn load_config(
    path: Option<&Path>,
    port: Option<u16>,
    rules_dir: Option<PathBuf>,
) -> anyhow::Result<FogConfig> {
    let mut config = match path {
        Some(path) => FogConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => FogConfig::default(),
    };
    apply_overrides(&mut config, port, rules_dir);
    Ok(config)
}

fn apply_overrides(config: &mut FogConfig, port: Option<u16>, rules_dir: Option<PathBuf>) {
    if let Some(port) = port {
        config.api.port = port;
    }
    if let Some(dir) = rules_dir {
        config.solver.rules_dir = dir;
    }
}

pub async fn run(config: FogConfig) -> anyhow::Result<()> {
    info!("fogmesh daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let resolver = Resolver::from_config(&config.solver).context("initializing placement resolver")?;
    info!(mode = ?config.deploy.mode, "placement resolver initialized");

    let kubectl = Arc::new(Kubectl::from_config(&config.platform).context("initializing platform client")?);
    info!(namespace = %kubectl.namespace(), "platform client initialized");

    let watcher = Arc::new(InfrastructureWatcher::start(kubectl.clone(), &config.watcher));
    info!("infrastructure watcher started");

    let inventory: Arc<dyn NodeInventory> = watcher.clone();
    let manager = Arc::new(Manager::new(
        Arc::new(resolver),
        Arc::new(PlatformProvisioner::new(kubectl)),
        inventory.clone(),
        ManagerConfig::from_config(&config),
    ));
    info!(partial_apply = ?config.deploy.partial_apply, "deployment manager initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let changes_handle = tokio::spawn(
        manager
            .clone()
            .watch_infrastructure(watcher.subscribe(), shutdown_rx.clone()),
    );

    // ── Start API server ───────────────────────────────────────

    let tasks = fogmesh_api::BackgroundTasks::new();
    let router = fogmesh_api::build_router(manager, inventory, tasks.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding API listener on {addr}"))?;

    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_shutdown.changed().await;
    });
    let server_handle = tokio::spawn(async move { server.await });

    shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // ── Drain ──────────────────────────────────────────────────

    watcher.stop().await;

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server error"),
        Err(e) => error!(error = %e, "API server task failed"),
    }
    if let Err(e) = changes_handle.await {
        error!(error = %e, "infrastructure change loop failed");
    }

    info!(pending = tasks.len(), "waiting for accepted requests");
    tasks.drain().await;

    info!("fogmesh daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
