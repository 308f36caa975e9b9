use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Run metrics
    pub static ref RECONCILIATION_RUNS: IntCounter = IntCounter::new(
        "reconciliation_runs_total",
        "Total number of reconciliation runs started"
    ).expect("valid metric definition");

    pub static ref BOOKINGS_SYNCED: IntCounter = IntCounter::new(
        "bookings_synced_total",
        "Bookings recomputed and written back"
    ).expect("valid metric definition");

    pub static ref BOOKING_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("booking_errors_total", "Per-booking reconciliation failures"),
        &["class"]
    ).expect("valid metric definition");

    pub static ref DISCREPANCIES_FOUND: IntCounter = IntCounter::new(
        "discrepancies_found_total",
        "Stored fee values that differed from the ledger beyond epsilon"
    ).expect("valid metric definition");

    pub static ref ESTIMATED_BREAKDOWNS: IntCounter = IntCounter::new(
        "estimated_breakdowns_total",
        "Breakdowns computed from the fallback fee model"
    ).expect("valid metric definition");

    // Ledger client metrics
    pub static ref LEDGER_FETCH_RETRIES: IntCounter = IntCounter::new(
        "ledger_fetch_retries_total",
        "Transient ledger fetch failures that were retried"
    ).expect("valid metric definition");

    pub static ref LEDGER_FETCH_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ledger_fetch_latency_seconds",
            "Ledger snapshot fetch latency"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("valid metric definition");
}

pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(RECONCILIATION_RUNS.clone()))?;
    REGISTRY.register(Box::new(BOOKINGS_SYNCED.clone()))?;
    REGISTRY.register(Box::new(BOOKING_ERRORS.clone()))?;
    REGISTRY.register(Box::new(DISCREPANCIES_FOUND.clone()))?;
    REGISTRY.register(Box::new(ESTIMATED_BREAKDOWNS.clone()))?;
    REGISTRY.register(Box::new(LEDGER_FETCH_RETRIES.clone()))?;
    REGISTRY.register(Box::new(LEDGER_FETCH_LATENCY.clone()))?;
    Ok(())
}

/// Prometheus text exposition of the registry.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
