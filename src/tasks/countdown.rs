//! Per-routine countdown task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::{AppState, RoutineId, TickOutcome};

/// Ticks once per `period` until the routine's duration has elapsed, then
/// completes it. Exits quietly once another task owns the routine's timer.
pub async fn countdown_task(state: Arc<AppState>, id: RoutineId, generation: u64, period: Duration) {
    debug!("Countdown task for routine {} started (generation {})", id, generation);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match state.tick(id, generation) {
            Ok(TickOutcome::Running { remaining_ms }) => {
                debug!("Routine {} has {} ms remaining", id, remaining_ms);
            }
            Ok(TickOutcome::Elapsed) => {
                info!("Countdown for routine {} elapsed", id);
                match state.complete(id, generation).await {
                    Ok(Some(channel)) => debug!("Completion of routine {} delivered via {:?}", id, channel),
                    Ok(None) => debug!("Routine {} was stopped before completing", id),
                    Err(e) => error!("Failed to complete routine {}: {}", id, e),
                }
                break;
            }
            Ok(TickOutcome::Superseded) => {
                debug!("Countdown task for routine {} superseded", id);
                break;
            }
            Err(e) => {
                error!("Countdown tick for routine {} failed: {}", id, e);
                break;
            }
        }
    }
}
