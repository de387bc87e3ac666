//! # Prometheus Metrics
//!
//! Ledger activity counters for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use hena_token::events::TokenEvent;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct TokenMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Recorded transfer events.
    pub transfers_total: IntCounter,
    /// Recorded approval events.
    pub approvals_total: IntCounter,
    /// Recorded burn events.
    pub burns_total: IntCounter,
    /// RPC calls that failed, labelled by error kind.
    pub failed_operations_total: IntCounterVec,
    /// Total supply in whole tokens, truncated.
    pub total_supply: IntGauge,
    /// Time spent inside a single RPC operation, lock wait included.
    pub operation_latency_seconds: Histogram,
}

impl TokenMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("hena".into()), None)?;

        let transfers_total =
            IntCounter::new("transfers_total", "Total number of recorded transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let approvals_total =
            IntCounter::new("approvals_total", "Total number of recorded approvals")?;
        registry.register(Box::new(approvals_total.clone()))?;

        let burns_total = IntCounter::new("burns_total", "Total number of recorded burns")?;
        registry.register(Box::new(burns_total.clone()))?;

        let failed_operations_total = IntCounterVec::new(
            Opts::new(
                "failed_operations_total",
                "Total number of rejected ledger operations",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(failed_operations_total.clone()))?;

        let total_supply = IntGauge::new("total_supply", "Total token supply in whole tokens")?;
        registry.register(Box::new(total_supply.clone()))?;

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Ledger operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            transfers_total,
            approvals_total,
            burns_total,
            failed_operations_total,
            total_supply,
            operation_latency_seconds,
        })
    }

    /// Bumps the counter matching `event`.
    pub fn observe_event(&self, event: &TokenEvent) {
        match event {
            TokenEvent::Transfer { .. } => self.transfers_total.inc(),
            TokenEvent::Approval { .. } => self.approvals_total.inc(),
            TokenEvent::Burn { .. } => self.burns_total.inc(),
        }
    }

    /// Sets the supply gauge from an amount in the smallest denomination.
    pub fn set_total_supply(&self, supply: u128, decimals: u8) {
        let whole = hena_token::types::unit_scale(decimals)
            .map(|scale| supply / scale)
            .unwrap_or(0);
        self.total_supply.set(i64::try_from(whole).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<TokenMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
