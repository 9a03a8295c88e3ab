//! Decoder metrics definitions.
//!
//! All metrics use OpenTelemetry conventions; with no meter provider
//! installed they are no-ops.

use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Central metrics handle for the decoding pipeline.
#[derive(Clone)]
pub struct DecoderMetrics {
    pub transactions_decoded: Counter<u64>,
    pub stage_failures: Counter<u64>,
    pub calls_decoded: Counter<u64>,
    pub events_decoded: Counter<u64>,
    pub decode_latency_ms: Histogram<f64>,
}

impl DecoderMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            transactions_decoded: meter
                .u64_counter("chaintrace.transactions_decoded")
                .with_description("Transactions run through the full decode pipeline")
                .build(),
            stage_failures: meter
                .u64_counter("chaintrace.stage_failures")
                .with_description("Pipeline stages that failed and were recorded as partial results")
                .build(),
            calls_decoded: meter
                .u64_counter("chaintrace.calls_decoded")
                .with_description("Call frames decoded")
                .build(),
            events_decoded: meter
                .u64_counter("chaintrace.events_decoded")
                .with_description("Logs decoded into events")
                .build(),
            decode_latency_ms: meter
                .f64_histogram("chaintrace.decode_latency_ms")
                .with_description("Time to decode one transaction in milliseconds")
                .build(),
        }
    }

    /// Metrics on the globally installed meter provider.
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter("chaintrace"))
    }

    pub fn record_transaction(&self, chain: &str, complete: bool, ms: f64) {
        let status = if complete { "complete" } else { "partial" };
        self.transactions_decoded.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("status", status),
            ],
        );
        self.decode_latency_ms
            .record(ms, &[KeyValue::new("chain", chain.to_string())]);
    }

    pub fn record_stage_failure(&self, chain: &str, stage: &str) {
        self.stage_failures.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("stage", stage.to_string()),
            ],
        );
    }

    pub fn record_calls(&self, chain: &str, count: u64) {
        self.calls_decoded
            .add(count, &[KeyValue::new("chain", chain.to_string())]);
    }

    pub fn record_events(&self, chain: &str, count: u64) {
        self.events_decoded
            .add(count, &[KeyValue::new("chain", chain.to_string())]);
    }
}
