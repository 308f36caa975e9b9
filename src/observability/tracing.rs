use tracing::Span;
use tracing_subscriber::EnvFilter;
use crate::config::LoggingConfig;
use crate::types::ids::{BookingId, RunId};

pub fn trace_reconciliation_run(run_id: &RunId, candidates: usize) -> Span {
    tracing::info_span!(
        "reconciliation_run",
        run_id = %run_id,
        candidates = candidates,
    )
}

pub fn trace_booking(booking_id: &BookingId) -> Span {
    tracing::info_span!(
        "reconcile_booking",
        booking_id = %booking_id,
    )
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
