//! Structured observability hooks for downstream target processing.
//!
//! This module provides:
//! - A target-scoped tracing span, attached to the per-target future
//! - Emission functions for lifecycle events: waiting, retry, trigger, block result
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! Human-readable progress goes to stdout separately; these are for log
//! pipelines.

use tracing::{debug, info};

/// Span tagged with the repository entry being processed.
///
/// ```ignore
/// orchestrator.run_target(&target).instrument(target_span(&target.entry)).await
/// ```
pub fn target_span(entry: &str) -> tracing::Span {
    tracing::info_span!("downstream.target", entry = %entry)
}

/// Emit event: an in-flight build blocks the trigger; waiting begins.
pub fn emit_waiting(entry: &str, number: u64, status: &str) {
    info!(event = "target.waiting", entry = %entry, build = number, status = %status);
}

/// Emit event: a fetch or trigger failed while waiting and will be retried.
pub fn emit_transient_retry(entry: &str, error: &dyn std::fmt::Display) {
    debug!(event = "target.retry", entry = %entry, error = %error);
}

/// Emit event: a restart or promote succeeded.
pub fn emit_triggered(entry: &str, action: &str, reference: u64, triggered: u64) {
    info!(
        event = "target.triggered",
        entry = %entry,
        action = %action,
        reference_build = reference,
        triggered_build = triggered,
    );
}

/// Emit event: blocking on a triggered build ended.
pub fn emit_block_finished(entry: &str, number: u64, outcome: &str) {
    info!(event = "block.finished", entry = %entry, build = number, outcome = %outcome);
}
