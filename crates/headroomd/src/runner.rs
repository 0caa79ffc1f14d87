//! The periodic scheduler loop

use headroom_core::{TickOutcome, TierScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

/// Longest uninterrupted sleep between shutdown checks
const POLL_SLICE: Duration = Duration::from_secs(1);

/// Tick the scheduler every tick period until shutdown is signalled.
///
/// Shutdown is only observed between ticks, so a tick in progress always
/// completes. Each outcome is forwarded to the service loop.
pub async fn run_scheduler(
    scheduler: Arc<Mutex<TierScheduler>>,
    outcomes: mpsc::UnboundedSender<TickOutcome>,
    shutdown: watch::Receiver<bool>,
) {
    info!("Scheduler loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let started = Instant::now();
        let (outcome, period) = {
            let mut scheduler = scheduler.lock().await;
            let outcome = scheduler.tick(headroom_util::now()).await;
            (outcome, scheduler.tick_period())
        };
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            events = outcome.events.len(),
            "Tick complete"
        );

        if outcomes.send(outcome).is_err() {
            break;
        }
        if !sleep_until(started + period, &shutdown).await {
            break;
        }
    }

    info!("Scheduler loop stopped");
}

/// Sleep until `deadline` in slices of at most [`POLL_SLICE`]. Returns false
/// as soon as shutdown is requested.
async fn sleep_until(deadline: Instant, shutdown: &watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep((deadline - now).min(POLL_SLICE)).await;
    }
}
