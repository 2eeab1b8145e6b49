//! Routine Timer - a local service for recurring routine countdowns
//! 
//! This is the main entry point for the routine-timer application.

use std::sync::Arc;
use tokio::{net::TcpListener, sync::{broadcast, mpsc}};
use tracing::{info, warn};

use routine_timer::{
    api::{create_router, ApiContext},
    config::Config,
    notify::{DesktopSurface, NotificationSurface, Notifier, RecordingSurface},
    state::{AppState, NotificationPermission},
    storage::{FileStore, KeyValueStore, MemoryStore},
    tasks::{notification_interaction_task, worker_message_task},
    utils::shutdown_signal,
    worker::{AssetSource, BackgroundWorker, BrowserLauncher, DirectorySource, DisabledLauncher, PageLauncher},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("routine_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting routine-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, policy={:?}, data={}",
          config.host, config.port, config.policy, config.data_dir.display());

    let store: Arc<dyn KeyValueStore> = if config.ephemeral {
        info!("Running with in-memory storage");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(&config.data_dir))
    };

    let (events_tx, _) = broadcast::channel(256);
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (interaction_tx, interaction_rx) = mpsc::unbounded_channel();

    let (direct, worker_surface): (Arc<dyn NotificationSurface>, Arc<dyn NotificationSurface>) =
        if config.headless {
            (
                Arc::new(RecordingSurface::new(NotificationPermission::Granted)),
                Arc::new(RecordingSurface::new(NotificationPermission::Granted)),
            )
        } else {
            (
                Arc::new(DesktopSurface::new()),
                Arc::new(DesktopSurface::with_relay(interaction_tx)),
            )
        };

    let assets: Arc<dyn AssetSource> = Arc::new(DirectorySource::new(&config.assets_dir));
    let launcher: Arc<dyn PageLauncher> = if config.no_open {
        Arc::new(DisabledLauncher)
    } else {
        Arc::new(BrowserLauncher)
    };

    // Registration is best effort; without a worker notifications go direct
    let worker = if config.no_worker {
        info!("Background worker disabled");
        None
    } else {
        match BackgroundWorker::register(
            config.worker_settings(),
            Arc::clone(&assets),
            worker_surface,
            launcher,
            message_tx,
            events_tx.clone(),
        ).await {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("Background worker registration failed: {}", e);
                None
            }
        }
    };

    if let Some(worker) = &worker {
        tokio::spawn(notification_interaction_task(Arc::clone(worker), interaction_rx));
    }

    let notifier = Notifier::new(config.policy, direct, worker.clone(), events_tx.clone());
    let state = Arc::new(AppState::new(config.controller_settings(), store, notifier, events_tx));

    let report = state.reconcile()?;
    if !report.resumed.is_empty() || !report.reset.is_empty() {
        info!("Reconciled stored routines: resumed={:?}, reset={:?}", report.resumed, report.reset);
    }

    // Apply messages relayed by the worker
    tokio::spawn(worker_message_task(Arc::clone(&state), message_rx));

    // Create HTTP router with all endpoints
    let app = create_router(ApiContext {
        state,
        worker,
        assets,
    });

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /routines                  - List routines");
    info!("  POST   /routines                  - Add a routine");
    info!("  POST   /routines/:id/start        - Start a countdown");
    info!("  POST   /routines/:id/stop         - Stop a countdown");
    info!("  DELETE /routines/:id              - Delete a routine");
    info!("  POST   /routines/stop-all         - Stop every countdown");
    info!("  GET    /events                    - Page event stream");
    info!("  GET    /notifications/permission  - Permission status");
    info!("  POST   /notifications/permission  - Request permission");
    info!("  GET    /status                    - Check current status");
    info!("  GET    /health                    - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
