//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize guards and their sweepers
//! - Start optional metrics, admin API and config watcher
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{self, AdminState};
use crate::config::watcher::{apply_updates, ConfigWatcher};
use crate::config::GuardConfig;
use crate::guard::{spawn_sweeper, ConnectionGuard, RequestGuard};
use crate::http::GuardServer;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to bind admin API on {address}: {source}")]
    Admin {
        address: String,
        source: std::io::Error,
    },

    #[error("Failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Start every subsystem and serve until `shutdown` is triggered.
///
/// When `config_path` is set the file is watched and guard thresholds are
/// reloaded on change.
pub async fn run(
    config: GuardConfig,
    config_path: Option<PathBuf>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let connections = Arc::new(ConnectionGuard::new(config.connection_guard.clone()));
    let requests = Arc::new(RequestGuard::new(config.request_guard.clone()));

    let mut tasks = vec![
        spawn_sweeper(Arc::clone(&connections), shutdown.subscribe()),
        spawn_sweeper(Arc::clone(&requests), shutdown.subscribe()),
    ];

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(|source| StartupError::Admin {
                address: config.admin.bind_address.clone(),
                source,
            })?;
        let state = AdminState {
            connections: Arc::clone(&connections),
            requests: Arc::clone(&requests),
            api_key: Arc::from(config.admin.api_key.as_str()),
            started_at: Instant::now(),
        };
        let admin_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        }));
    }

    // Held until return; dropping it stops the file watch.
    let _watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            let handle = watcher.run()?;
            tasks.push(tokio::spawn(apply_updates(
                updates,
                Arc::clone(&connections),
                Arc::clone(&requests),
                shutdown.subscribe(),
            )));
            Some(handle)
        }
        None => None,
    };

    let listener = Listener::bind(&config.listener).await?;
    let server = GuardServer::new(config.listener.clone(), connections, requests);
    let result = server.run(listener, shutdown.subscribe()).await;

    // The server can return on its own (listener closed); make sure the
    // background tasks stop too.
    shutdown.trigger();
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("All subsystems stopped");
    result.map_err(StartupError::from)
}
