//! Inbound ingestion loop.
//!
//! Drains the bus's inbound queue and runs each message through the
//! [`Dispatcher`] on Tokio's blocking pool, since store writes are
//! synchronous.  At most `max_in_flight` dispatches run at once; when the
//! limit is reached the loop stops reading until one finishes, which in turn
//! fills the bounded inbound queue and pauses the broker poll loop.
//!
//! Every spawned dispatch is tracked in a [`JoinSet`] and joined before
//! [`run_ingest`] returns, so no message that was taken off the queue is lost
//! on shutdown.

use std::sync::Arc;

use plcbridge_middleware::BusMessage;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

use crate::dispatcher::{DispatchReport, Dispatcher};

/// Default number of dispatches allowed to run concurrently.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Dispatch every message from `inbound` until the queue closes.
///
/// Returns the number of dispatches that ran to completion.  A `max_in_flight`
/// of zero is treated as one.
pub async fn run_ingest(
    mut inbound: mpsc::Receiver<BusMessage>,
    dispatcher: Arc<Dispatcher>,
    max_in_flight: usize,
) -> u64 {
    let limit = max_in_flight.max(1);
    let mut in_flight: JoinSet<DispatchReport> = JoinSet::new();
    let mut completed = 0u64;

    while let Some(message) = inbound.recv().await {
        while in_flight.len() >= limit {
            match in_flight.join_next().await {
                Some(result) => completed += settle(result),
                None => break,
            }
        }
        let dispatcher = Arc::clone(&dispatcher);
        in_flight.spawn_blocking(move || dispatcher.dispatch(&message.topic, &message.payload));
    }

    while let Some(result) = in_flight.join_next().await {
        completed += settle(result);
    }
    info!(completed, "inbound queue closed; ingest stopped");
    completed
}

fn settle(result: Result<DispatchReport, JoinError>) -> u64 {
    match result {
        Ok(_) => 1,
        Err(e) => {
            error!(error = %e, "dispatch task failed");
            0
        }
    }
}
