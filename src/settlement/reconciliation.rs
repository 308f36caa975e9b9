use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use futures::{future, stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use crate::config::reconciliation::ReconciliationConfig;
use crate::error::{Error, Result};
use crate::interfaces::booking_store::BookingStore;
use crate::interfaces::ledger_client::LedgerClient;
use crate::ledger::cache::SnapshotCache;
use crate::ledger::snapshot::LedgerSnapshot;
use crate::observability::metrics::{
    BOOKINGS_SYNCED, BOOKING_ERRORS, DISCREPANCIES_FOUND, ESTIMATED_BREAKDOWNS, RECONCILIATION_RUNS,
};
use crate::observability::tracing::{trace_booking, trace_reconciliation_run};
use crate::settlement::fee_calculator::FeeCalculator;
use crate::settlement::refund_policy::{AdjustedBreakdown, RefundPolicyResolver};
use crate::settlement::report::{
    BookingFailure, BookingOutcome, Discrepancy, DiscrepancyField, OutcomeStatus, ReconciliationResult,
};
use crate::store::booking::Booking;
use crate::types::amount::Amount;
use crate::types::ids::{BookingId, PaymentId, RunId};

/// Recomputes booking fees from the payment ledger and writes them back.
///
/// Bookings are processed through a bounded pool of `max_concurrency` in-flight tasks.
/// One booking failing never stops the others; only a failed candidate query aborts a run.
pub struct ReconciliationEngine {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn BookingStore>,
    calculator: FeeCalculator,
    config: ReconciliationConfig,
    cache: Option<Arc<SnapshotCache>>,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn BookingStore>,
        calculator: FeeCalculator,
        config: ReconciliationConfig,
    ) -> Self {
        ReconciliationEngine {
            ledger,
            store,
            calculator,
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Reconcile `ids`, or every booking with a payment reference when `None`.
    pub async fn reconcile(&self, ids: Option<&HashSet<BookingId>>) -> Result<ReconciliationResult> {
        self.reconcile_with_cancel(ids, CancellationToken::new()).await
    }

    /// Like [`reconcile`](Self::reconcile), but stops launching new bookings once `cancel`
    /// fires or the configured run timeout elapses. In-flight bookings finish; the rest
    /// are reported as skipped.
    pub async fn reconcile_with_cancel(
        &self,
        ids: Option<&HashSet<BookingId>>,
        cancel: CancellationToken,
    ) -> Result<ReconciliationResult> {
        RECONCILIATION_RUNS.inc();
        let run_id = RunId::new();

        let candidates = self.store.list_candidates(ids).await.map_err(|e| {
            tracing::error!(run_id = %run_id, "Candidate selection failed: {}", e);
            match e {
                Error::CandidateSelection(_) => e,
                other => Error::CandidateSelection(other.to_string()),
            }
        })?;

        let span = trace_reconciliation_run(&run_id, candidates.len());
        self.run_candidates(run_id, candidates, cancel).instrument(span).await
    }

    async fn run_candidates(
        &self,
        run_id: RunId,
        candidates: Vec<Booking>,
        cancel: CancellationToken,
    ) -> Result<ReconciliationResult> {
        let mut result = ReconciliationResult::new(run_id, candidates.len());
        tracing::info!("Reconciliation run started");

        if let Some(cache) = &self.cache {
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Dropped expired ledger snapshots");
            }
        }

        let timeout = match self.config.run_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let stop_signal = async move {
            let deadline = async {
                match timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!("Run cancelled, no further bookings will start");
                }
                _ = deadline => {
                    tracing::warn!("Run timeout reached, no further bookings will start");
                }
            }
        };

        let mut outcomes = stream::iter(candidates.into_iter().enumerate())
            .take_until(Box::pin(stop_signal))
            .map(|(position, booking)| self.process_booking(position, booking))
            .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            result.record(outcome);
        }

        // Stopped only if the stop signal actually cut the candidate stream
        let cut_short = outcomes.get_ref().get_ref().is_stopped();
        result.finish(cut_short);
        tracing::info!(
            synced = result.synced_count,
            errors = result.error_count,
            discrepancies = result.discrepancy_count(),
            skipped = result.skipped_count,
            "Reconciliation run finished"
        );

        Ok(result)
    }

    async fn process_booking(&self, position: usize, booking: Booking) -> BookingOutcome {
        let span = trace_booking(&booking.id);
        self.reconcile_booking(position, &booking).instrument(span).await
    }

    async fn reconcile_booking(&self, position: usize, booking: &Booking) -> BookingOutcome {
        let adjusted = match self.recompute(booking).await {
            Ok(adjusted) => adjusted,
            // Stored values stay as they were
            Err(e) => return self.failed(position, booking, e, Vec::new()),
        };

        let discrepancies = self.compare(booking, &adjusted);
        if !discrepancies.is_empty() {
            DISCREPANCIES_FOUND.inc_by(discrepancies.len() as u64);
            for d in &discrepancies {
                tracing::warn!(
                    field = ?d.field,
                    stored = %d.stored_value,
                    recomputed = %d.recomputed_value,
                    difference = %d.absolute_difference,
                    confidence = ?d.confidence,
                    "Fee discrepancy"
                );
            }
        }

        if let Err(e) = self.store.update_fees(booking.id, &adjusted).await {
            let e = match e {
                Error::StoreWrite { .. } | Error::BookingNotFound(_) => e,
                other => Error::StoreWrite {
                    booking_id: booking.id,
                    message: other.to_string(),
                },
            };
            return self.failed(position, booking, e, discrepancies);
        }

        BOOKINGS_SYNCED.inc();
        let estimated = !adjusted.breakdown.is_verified();
        if estimated {
            ESTIMATED_BREAKDOWNS.inc();
        }
        if let Some(status) = adjusted.dispute.filter(|s| s.is_open()) {
            tracing::info!(dispute = ?status, "Payment has an open dispute");
        }
        tracing::debug!(
            net_application_fee = %adjusted.breakdown.net_application_fee,
            net_commission = %adjusted.breakdown.net_commission,
            refund_state = ?adjusted.refund_state,
            "Booking synced"
        );

        BookingOutcome {
            position,
            booking_id: booking.id,
            discrepancies,
            status: OutcomeStatus::Synced {
                estimated,
                dispute: adjusted.dispute,
            },
        }
    }

    /// Ledger-derived, refund-adjusted fees for one booking. Reads only; nothing is written.
    pub async fn recompute(&self, booking: &Booking) -> Result<AdjustedBreakdown> {
        let payment_id = booking
            .payment_id
            .as_ref()
            .ok_or(Error::MissingPaymentReference(booking.id))?;

        let snapshot = self.fetch_snapshot(payment_id).await?;
        let breakdown = self.calculator.compute_breakdown(&snapshot, &booking.fee_intent)?;
        RefundPolicyResolver::resolve_refund_adjustment(booking, &snapshot, breakdown)
    }

    async fn fetch_snapshot(&self, payment_id: &PaymentId) -> Result<LedgerSnapshot> {
        if let Some(cache) = &self.cache {
            if let Some(snapshot) = cache.get(payment_id) {
                return Ok(snapshot);
            }
        }

        let snapshot = self.ledger.fetch_snapshot(payment_id).await?;
        if let Some(cache) = &self.cache {
            cache.insert(snapshot.clone());
        }
        Ok(snapshot)
    }

    fn compare(&self, booking: &Booking, adjusted: &AdjustedBreakdown) -> Vec<Discrepancy> {
        let recomputed = &adjusted.breakdown;
        let confidence = recomputed.confidence();
        let fields = [
            (
                DiscrepancyField::NetApplicationFee,
                booking.stored.net_application_fee,
                recomputed.net_application_fee,
            ),
            (
                DiscrepancyField::NetCommission,
                booking.stored.net_commission,
                recomputed.net_commission,
            ),
        ];

        fields
            .into_iter()
            .filter_map(|(field, stored, recomputed_value)| {
                let difference = difference(stored, recomputed_value);
                (difference > self.config.epsilon).then(|| Discrepancy {
                    booking_id: booking.id,
                    payment_id: recomputed.payment_id.clone(),
                    field,
                    stored_value: stored,
                    recomputed_value,
                    absolute_difference: difference,
                    confidence,
                })
            })
            .collect()
    }

    fn failed(
        &self,
        position: usize,
        booking: &Booking,
        error: Error,
        discrepancies: Vec<Discrepancy>,
    ) -> BookingOutcome {
        let class = error.class();
        BOOKING_ERRORS.with_label_values(&[class.as_str()]).inc();
        tracing::error!(class = class.as_str(), "Booking reconciliation failed: {}", error);

        BookingOutcome {
            position,
            booking_id: booking.id,
            discrepancies,
            status: OutcomeStatus::Failed(BookingFailure {
                booking_id: booking.id,
                payment_id: booking.payment_id.clone(),
                class,
                message: error.to_string(),
            }),
        }
    }
}

fn difference(a: Amount, b: Amount) -> Amount {
    let diff = a.to_minor()
        .checked_sub(b.to_minor())
        .and_then(i64::checked_abs)
        .unwrap_or(i64::MAX);
    Amount::from_minor(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::ledger_client::MockLedgerClient;
    use crate::ledger::snapshot::ChargeFee;
    use crate::settlement::breakdown::FeeIntent;
    use crate::store::booking::StoredFees;
    use crate::store::memory::InMemoryBookingStore;

    fn amt(v: i64) -> Amount {
        Amount::from_minor(v)
    }

    fn snapshot_for(payment_id: &PaymentId, fee: i64) -> LedgerSnapshot {
        let mut snap = LedgerSnapshot::new(payment_id.clone(), "usd", amt(10_000));
        snap.charge_fee = Some(ChargeFee::flat(amt(fee)));
        snap
    }

    fn booking(payment: &str, net_app: i64, net_comm: i64) -> Booking {
        Booking::new(PaymentId::new(payment), FeeIntent::new(amt(700), amt(300), amt(1000)))
            .with_stored(StoredFees {
                gross_application_fee: amt(2000),
                net_application_fee: amt(net_app),
                processor_fees: Amount::zero(),
                net_commission: amt(net_comm),
            })
    }

    fn engine(ledger: MockLedgerClient, store: Arc<InMemoryBookingStore>, concurrency: usize) -> ReconciliationEngine {
        let config = ReconciliationConfig {
            max_concurrency: concurrency,
            ..ReconciliationConfig::default()
        };
        ReconciliationEngine::new(Arc::new(ledger), store, FeeCalculator::default(), config)
    }

    #[tokio::test]
    async fn test_discrepancy_reported_and_written() {
        let store = Arc::new(InMemoryBookingStore::new());
        let b = booking("pi_a", 2000, 1000);
        let id = b.id;
        store.insert(b);

        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_snapshot()
            .returning(|pid| Ok(snapshot_for(pid, 350)));

        let result = engine(ledger, store.clone(), 2).reconcile(None).await.unwrap();

        assert_eq!(result.synced_count, 1);
        assert_eq!(result.discrepancy_count(), 2);
        assert_eq!(result.discrepancies[0].field, DiscrepancyField::NetApplicationFee);
        assert_eq!(result.discrepancies[0].absolute_difference, amt(350));
        assert_eq!(result.discrepancies[1].absolute_difference, amt(175));

        let stored = store.get(id).unwrap().stored;
        assert_eq!(stored.net_application_fee, amt(1650));
        assert_eq!(stored.net_commission, amt(825));
    }

    #[tokio::test]
    async fn test_difference_within_epsilon_is_not_reported() {
        let store = Arc::new(InMemoryBookingStore::new());
        store.insert(booking("pi_a", 1651, 825));

        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_snapshot()
            .returning(|pid| Ok(snapshot_for(pid, 350)));

        let result = engine(ledger, store, 1).reconcile(None).await.unwrap();
        assert_eq!(result.synced_count, 1);
        assert!(result.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn test_missing_payment_reference_is_a_booking_error() {
        let store = Arc::new(InMemoryBookingStore::new());
        let mut orphan = booking("pi_x", 0, 0);
        orphan.payment_id = None;
        let orphan_id = orphan.id;
        store.insert(orphan);

        let ledger = MockLedgerClient::new();
        let ids: HashSet<BookingId> = [orphan_id].into_iter().collect();
        let result = engine(ledger, store, 1).reconcile(Some(&ids)).await.unwrap();

        assert_eq!(result.error_count, 1);
        assert_eq!(result.failures[0].class, crate::error::ErrorClass::LedgerPermanent);
    }

    #[tokio::test]
    async fn test_cache_avoids_second_fetch() {
        let store = Arc::new(InMemoryBookingStore::new());
        store.insert(booking("pi_shared", 0, 0));
        store.insert(booking("pi_shared", 0, 0));

        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_snapshot()
            .times(1)
            .returning(|pid| Ok(snapshot_for(pid, 350)));

        let cache = Arc::new(SnapshotCache::new(Duration::from_secs(60)));
        let result = engine(ledger, store, 1)
            .with_cache(cache.clone())
            .reconcile(None)
            .await
            .unwrap();

        assert_eq!(result.synced_count, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_run_drops_expired_snapshots_of_other_payments() {
        let store = Arc::new(InMemoryBookingStore::new());
        store.insert(booking("pi_a", 0, 0));

        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_snapshot()
            .returning(|pid| Ok(snapshot_for(pid, 350)));

        let cache = Arc::new(SnapshotCache::new(Duration::from_millis(20)));
        cache.insert(snapshot_for(&PaymentId::new("pi_old"), 100));
        std::thread::sleep(Duration::from_millis(30));

        engine(ledger, store, 1)
            .with_cache(cache.clone())
            .reconcile(None)
            .await
            .unwrap();

        // only the snapshot fetched by this run is left
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&PaymentId::new("pi_a")).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let store = Arc::new(InMemoryBookingStore::new());
        store.insert(booking("pi_a", 0, 0));
        store.insert(booking("pi_b", 0, 0));

        let ledger = MockLedgerClient::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine(ledger, store, 1)
            .reconcile_with_cancel(None, cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.skipped_count, 2);
        assert_eq!(result.synced_count + result.error_count, 0);
    }

    #[test]
    fn test_difference_saturates() {
        assert_eq!(difference(amt(i64::MIN), amt(1)), amt(i64::MAX));
        assert_eq!(difference(amt(5), amt(8)), amt(3));
    }
}
