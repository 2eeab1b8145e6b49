//! Message relays between the worker and the controller

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    state::AppState,
    worker::{BackgroundWorker, NotificationInteraction, WorkerMessage},
};

/// Controller side: apply messages sent by the background worker
pub async fn worker_message_task(state: Arc<AppState>, mut messages: mpsc::UnboundedReceiver<WorkerMessage>) {
    info!("Listening for worker messages");

    while let Some(message) = messages.recv().await {
        if let Err(e) = state.handle_worker_message(message) {
            error!("Failed to handle worker message: {}", e);
        }
    }

    warn!("Worker message channel closed");
}

/// Worker side: route notification interactions reported by the desktop
pub async fn notification_interaction_task(
    worker: Arc<BackgroundWorker>,
    mut interactions: mpsc::UnboundedReceiver<NotificationInteraction>,
) {
    while let Some(interaction) = interactions.recv().await {
        if let Some(outcome) = worker.handle_interaction(interaction) {
            info!("Notification click handled: {:?}", outcome);
        }
    }
}
