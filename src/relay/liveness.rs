//! Executor liveness monitoring.
//!
//! # Responsibilities
//! - Periodically probe the authoritative executor connection
//! - Terminate a connection that is both silent and idle
//!
//! # State Transitions
//! ```text
//! no connection                        → Idle
//! flag set                             → clear flag, probe          (Probed)
//! flag clear, pending work             → probe, keep flag clear     (Exempted)
//! flag clear, no pending work          → terminate                  (Terminated)
//! ```
//!
//! # Design Decisions
//! - A busy executor may be slow to answer probes while it computes a
//!   reply; outstanding work exempts it from termination
//! - The exemption has no upper bound; stuck requests are still released
//!   by their own deadlines, after which the next tick terminates

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::observability::metrics;
use crate::relay::channel::ExecutorChannel;
use crate::relay::table::CorrelationTable;

/// What a single monitor tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No executor connection installed.
    Idle,
    /// The previous probe was answered; a new one was sent.
    Probed,
    /// The previous probe went unanswered but work is in flight.
    Exempted { pending: usize },
    /// The previous probe went unanswered and nothing is in flight.
    Terminated,
}

pub struct LivenessMonitor {
    table: Arc<CorrelationTable>,
    channel: Arc<ExecutorChannel>,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(table: Arc<CorrelationTable>, channel: Arc<ExecutorChannel>, interval: Duration) -> Self {
        Self {
            table,
            channel,
            interval,
        }
    }

    /// Run one probe round.
    pub fn tick(&self) -> ProbeOutcome {
        let Some(connection) = self.channel.current() else {
            return ProbeOutcome::Idle;
        };

        if !connection.is_alive() {
            let pending = self.table.size();
            if pending > 0 {
                tracing::warn!(
                    connection_id = %connection.id(),
                    pending,
                    "Probe unanswered but requests are in flight, keeping executor connection"
                );
                connection.probe();
                metrics::record_probe("exempted");
                return ProbeOutcome::Exempted { pending };
            }

            tracing::warn!(
                connection_id = %connection.id(),
                "Probe unanswered and no requests in flight, terminating executor connection"
            );
            connection.terminate();
            metrics::record_probe("terminated");
            return ProbeOutcome::Terminated;
        }

        connection.clear_alive();
        connection.probe();
        metrics::record_probe("sent");
        ProbeOutcome::Probed
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Liveness monitor starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.tick();
                    tracing::trace!(?outcome, "Liveness tick");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Liveness monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
