//! # Prometheus Metrics
//!
//! Operational metrics for the issuance node, scraped by Prometheus at
//! `/metrics` on the metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] under the
//! `zkgrade` namespace so they do not collide with the default global
//! registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use zkgrade_protocol::LoanDecision;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Loan requests received, whatever their outcome.
    pub loan_requests_total: IntCounter,
    pub loans_approved_total: IntCounter,
    pub loans_rejected_total: IntCounter,
    /// New tokens written to the registry.
    pub tokens_issued_total: IntCounter,
    /// Requests satisfied by an existing live token.
    pub tokens_reused_total: IntCounter,
    /// Requests that ended in an error instead of a decision.
    pub issuance_failures_total: IntCounter,
    /// Tokens currently held by the registry, live or not.
    pub tokens_stored: IntGauge,
    /// Time from request receipt to decision, in seconds.
    pub decision_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("zkgrade".into()), None)?;

        let loan_requests_total = counter(
            &registry,
            "loan_requests_total",
            "Total number of loan requests received",
        )?;
        let loans_approved_total =
            counter(&registry, "loans_approved_total", "Total number of approved loans")?;
        let loans_rejected_total =
            counter(&registry, "loans_rejected_total", "Total number of rejected loans")?;
        let tokens_issued_total = counter(
            &registry,
            "tokens_issued_total",
            "Total number of credit-grade tokens issued",
        )?;
        let tokens_reused_total = counter(
            &registry,
            "tokens_reused_total",
            "Total number of requests served by an existing live token",
        )?;
        let issuance_failures_total = counter(
            &registry,
            "issuance_failures_total",
            "Total number of loan requests that failed before a decision",
        )?;

        let tokens_stored = IntGauge::new("tokens_stored", "Number of tokens in the registry")?;
        registry.register(Box::new(tokens_stored.clone()))?;

        let decision_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "decision_latency_seconds",
                "Loan request processing latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;
        registry.register(Box::new(decision_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            loan_requests_total,
            loans_approved_total,
            loans_rejected_total,
            tokens_issued_total,
            tokens_reused_total,
            issuance_failures_total,
            tokens_stored,
            decision_latency_seconds,
        })
    }

    /// Count one decided loan request.
    pub fn record_decision(&self, decision: &LoanDecision) {
        if decision.approval {
            self.loans_approved_total.inc();
        } else {
            self.loans_rejected_total.inc();
        }
        if decision.token_reused {
            self.tokens_reused_total.inc();
        } else {
            self.tokens_issued_total.inc();
        }
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
pub type SharedMetrics = Arc<NodeMetrics>;

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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use zkgrade_protocol::{EligibilityEvaluator, Grade};

    #[test]
    fn encode_uses_zkgrade_namespace() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.loan_requests_total.inc();
        metrics.tokens_stored.set(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("zkgrade_loan_requests_total 1"));
        assert!(text.contains("zkgrade_tokens_stored 3"));
        assert!(text.contains("zkgrade_decision_latency_seconds_bucket"));
    }

    #[test]
    fn record_decision_splits_outcomes() {
        let metrics = NodeMetrics::new().unwrap();
        let now = Utc::now();

        let approved =
            EligibilityEvaluator::decide_with_terms("TOK-1", Grade::B, 50_000_000, 1, false, now);
        let rejected = EligibilityEvaluator::decide_with_terms(
            "TOK-1",
            Grade::B,
            50_000_000,
            60_000_000,
            true,
            now,
        );
        metrics.record_decision(&approved);
        metrics.record_decision(&rejected);

        assert_eq!(metrics.loans_approved_total.get(), 1);
        assert_eq!(metrics.loans_rejected_total.get(), 1);
        assert_eq!(metrics.tokens_issued_total.get(), 1);
        assert_eq!(metrics.tokens_reused_total.get(), 1);
    }
}
