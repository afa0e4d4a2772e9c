//! Logging setup and structured release telemetry.
//!
//! Stagecraft never prints machine-readable events to stdout directly; it
//! emits `tracing` events with a stable set of fields (`event`, `env`,
//! `version`, `phase`, `outcome`) and lets the subscriber decide the sink
//! format (human-readable by default, JSON behind `--json-logs`).

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Honors `STAGECRAFT_LOG`, then `LOGGING`, then falls back to `debug` when
/// `verbose` is set or `info` otherwise.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_env("STAGECRAFT_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOGGING"))
        .unwrap_or_else(|_| {
            EnvFilter::new(if verbose { "debug" } else { "info" })
        });

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Emits a structured event for a release phase transition.
pub fn phase_event(env: &str, version: &str, phase: &str, outcome: &str) {
    tracing::info!(
        event = "phase_transition",
        env,
        version,
        phase,
        outcome,
        "release phase transition"
    );
}

/// Emits a structured event for a release's terminal outcome.
pub fn release_outcome_event(env: &str, version: &str, outcome: &str) {
    tracing::info!(
        event = "release_outcome",
        env,
        version,
        outcome,
        "release reached a terminal outcome"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_event_does_not_panic() {
        phase_event("staging", "1.0.0", "Build", "Succeeded");
        release_outcome_event("staging", "1.0.0", "Succeeded");
    }
}
