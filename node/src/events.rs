//! # Event Fan-out
//!
//! The node's [`EventSink`]: every recorded ledger event is logged, counted
//! in Prometheus and pushed to WebSocket subscribers.

use tokio::sync::broadcast;

use hena_token::events::{EventSink, TokenEvent};

use crate::metrics::SharedMetrics;

/// Broadcast channel capacity for live event streaming.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sink wired into the hosted token service.
pub struct BroadcastSink {
    tx: broadcast::Sender<TokenEvent>,
    metrics: SharedMetrics,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<TokenEvent>, metrics: SharedMetrics) -> Self {
        Self { tx, metrics }
    }
}

impl EventSink for BroadcastSink {
    fn record(&self, event: &TokenEvent) {
        match event {
            TokenEvent::Transfer { from, to, amount } => {
                let from = from.as_ref().map(|a| a.as_str()).unwrap_or("-");
                tracing::info!(from, to = %to, amount = %amount, "transfer recorded");
            }
            TokenEvent::Approval {
                owner,
                spender,
                amount,
            } => {
                tracing::info!(owner = %owner, spender = %spender, amount = %amount, "approval recorded");
            }
            TokenEvent::Burn { amount } => {
                tracing::info!(amount = %amount, "burn recorded");
            }
        }
        self.metrics.observe_event(event);
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}
