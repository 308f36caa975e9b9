use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use feerecon::api::rest::{create_router, ApiState};
use feerecon::config::loader::AppConfig;
use feerecon::interfaces::booking_store::BookingStore;
use feerecon::interfaces::ledger_client::LedgerClient;
use feerecon::ledger::cache::SnapshotCache;
use feerecon::ledger::http_client::HttpLedgerClient;
use feerecon::ledger::retry::{RetryPolicy, RetryingLedgerClient};
use feerecon::observability::metrics::register_metrics;
use feerecon::observability::tracing::init_tracing;
use feerecon::settlement::fee_calculator::FeeCalculator;
use feerecon::settlement::reconciliation::ReconciliationEngine;
use feerecon::store::memory::InMemoryBookingStore;
use feerecon::DEFAULT_ENV;

fn usage() -> &'static str {
    "usage: feerecon <run|serve> [env]"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("run");
    let env = args.get(1).map(String::as_str).unwrap_or(DEFAULT_ENV);

    let config = AppConfig::load(env).context("loading configuration")?;
    init_tracing(&config.logging);
    register_metrics().context("registering metrics")?;

    let store = Arc::new(
        InMemoryBookingStore::load_json(&config.store.bookings_path)
            .with_context(|| format!("loading bookings from {}", config.store.bookings_path))?,
    );
    let engine = Arc::new(build_engine(&config, store.clone())?);

    match command {
        "run" => run_once(&config, engine, store).await,
        "serve" => serve(&config, engine, store).await,
        other => bail!("unknown command {:?}; {}", other, usage()),
    }
}

fn build_engine(config: &AppConfig, store: Arc<InMemoryBookingStore>) -> anyhow::Result<ReconciliationEngine> {
    let http = HttpLedgerClient::new(&config.ledger).context("building ledger client")?;
    let ledger: Arc<dyn LedgerClient> = Arc::new(RetryingLedgerClient::new(
        http,
        RetryPolicy::from_config(&config.ledger),
    ));

    let mut engine = ReconciliationEngine::new(
        ledger,
        store,
        FeeCalculator::new(config.fees.clone()),
        config.reconciliation.clone(),
    );
    if config.ledger.cache_ttl_secs > 0 {
        let cache = SnapshotCache::new(Duration::from_secs(config.ledger.cache_ttl_secs));
        engine = engine.with_cache(Arc::new(cache));
    }

    Ok(engine)
}

async fn run_once(
    config: &AppConfig,
    engine: Arc<ReconciliationEngine>,
    store: Arc<InMemoryBookingStore>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight bookings");
            on_signal.cancel();
        }
    });

    let result = engine.reconcile_with_cancel(None, cancel).await?;

    store.save_json(&config.store.bookings_path)
        .with_context(|| format!("saving bookings to {}", config.store.bookings_path))?;

    println!("{}", result.summary());
    for d in &result.discrepancies {
        println!(
            "  {} {} {:?}: stored={} recomputed={} diff={} ({:?})",
            d.booking_id, d.payment_id, d.field, d.stored_value, d.recomputed_value,
            d.absolute_difference, d.confidence
        );
    }
    for f in &result.failures {
        println!("  {} failed [{}]: {}", f.booking_id, f.class.as_str(), f.message);
    }

    Ok(())
}

async fn serve(
    config: &AppConfig,
    engine: Arc<ReconciliationEngine>,
    store: Arc<InMemoryBookingStore>,
) -> anyhow::Result<()> {
    let state = Arc::new(ApiState {
        engine,
        store: store.clone() as Arc<dyn BookingStore>,
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.api.bind_addr))?;
    tracing::info!("Admin API listening on {}", config.api.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    store.save_json(&config.store.bookings_path)
        .with_context(|| format!("saving bookings to {}", config.store.bookings_path))?;
    Ok(())
}
