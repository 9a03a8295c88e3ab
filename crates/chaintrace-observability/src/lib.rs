//! # chaintrace-observability
//!
//! OpenTelemetry-based observability for ChainTrace.
//!
//! ## Built-in metrics
//! - `chaintrace.transactions_decoded` : counter, tagged with chain + status
//! - `chaintrace.stage_failures`       : counter, tagged with chain + stage
//! - `chaintrace.calls_decoded`        : counter, tagged with chain
//! - `chaintrace.events_decoded`       : counter, tagged with chain
//! - `chaintrace.decode_latency_ms`    : histogram, tagged with chain
//!
//! ## Structured logging
//! Text or JSON logs through `tracing-subscriber`, with levels configurable
//! per component.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::DecoderMetrics;
pub use tracing_setup::{init_tracing, LogConfig, TracingInitError};
