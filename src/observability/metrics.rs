//! Metrics collection for `partyline`.
//!
//! Provides Prometheus-compatible metrics and typed convenience functions
//! for recording measurements. Label values come from fixed enums
//! (phase kinds, game ids, action kinds) so cardinality stays bounded.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::PartylineError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `PartylineError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), PartylineError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| PartylineError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_gauge!(
        "partyline_sessions_active",
        "Number of sessions currently registered"
    );
    describe_counter!(
        "partyline_phase_transitions_total",
        "Total number of phases entered"
    );
    describe_counter!("partyline_votes_total", "Total number of ballots cast");
    describe_counter!(
        "partyline_private_fallbacks_total",
        "Private sends that fell back to the direct channel"
    );
    describe_counter!(
        "partyline_actions_total",
        "Inbound actions by kind and routing outcome"
    );
}

/// Sets the number of active sessions.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_active(count: usize) {
    gauge!("partyline_sessions_active").set(count as f64);
}

/// Records a phase being entered.
pub fn record_phase_entered(game: &'static str, phase: &'static str) {
    counter!(
        "partyline_phase_transitions_total",
        "game" => game,
        "phase" => phase
    )
    .increment(1);
}

/// Records a ballot.
pub fn record_vote(game: &'static str) {
    counter!("partyline_votes_total", "game" => game).increment(1);
}

/// Records a private send that degraded to the direct channel.
pub fn record_private_fallback() {
    counter!("partyline_private_fallbacks_total").increment(1);
}

/// Records an inbound action and whether it reached a session.
pub fn record_action(kind: &'static str, routed: bool) {
    counter!(
        "partyline_actions_total",
        "kind" => kind,
        "routed" => if routed { "true" } else { "false" }
    )
    .increment(1);
}
