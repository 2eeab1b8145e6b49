//! Delayed restart of a completed routine

use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error};

use crate::state::{AppState, RoutineId};

pub async fn restart_task(state: Arc<AppState>, id: RoutineId, generation: u64, delay: Duration) {
    sleep(delay).await;

    match state.restart(id, generation) {
        Ok(true) => debug!("Routine {} restarted after {:?}", id, delay),
        Ok(false) => debug!("Restart of routine {} no longer wanted", id),
        Err(e) => error!("Failed to restart routine {}: {}", id, e),
    }
}
