use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::error::ErrorClass;
use crate::ledger::snapshot::DisputeStatus;
use crate::settlement::breakdown::Confidence;
use crate::types::amount::Amount;
use crate::types::ids::{BookingId, PaymentId, RunId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyField {
    NetApplicationFee,
    NetCommission,
}

/// Stored value that differs from the recomputed one by more than epsilon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub booking_id: BookingId,
    pub payment_id: PaymentId,
    pub field: DiscrepancyField,
    pub stored_value: Amount,
    pub recomputed_value: Amount,
    pub absolute_difference: Amount,
    pub confidence: Confidence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookingFailure {
    pub booking_id: BookingId,
    pub payment_id: Option<PaymentId>,
    pub class: ErrorClass,
    pub message: String,
}

#[derive(Clone, Debug)]
pub enum OutcomeStatus {
    Synced {
        estimated: bool,
        dispute: Option<DisputeStatus>,
    },
    Failed(BookingFailure),
}

/// Result of reconciling one booking.
#[derive(Clone, Debug)]
pub struct BookingOutcome {
    /// Position in the candidate list, used to keep reports in store order.
    pub position: usize,
    pub booking_id: BookingId,
    pub discrepancies: Vec<Discrepancy>,
    pub status: OutcomeStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReconciliationResult {
    pub run_id: RunId,
    pub total_candidates: usize,
    pub synced_count: usize,
    pub error_count: usize,
    /// Candidates never started because the run was cancelled or timed out.
    pub skipped_count: usize,
    pub estimated_count: usize,
    pub cancelled: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub failures: Vec<BookingFailure>,
    pub disputed: Vec<BookingId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    positions: Vec<(usize, BookingId)>,
}

impl ReconciliationResult {
    pub fn new(run_id: RunId, total_candidates: usize) -> Self {
        ReconciliationResult {
            run_id,
            total_candidates,
            synced_count: 0,
            error_count: 0,
            skipped_count: 0,
            estimated_count: 0,
            cancelled: false,
            discrepancies: Vec::new(),
            failures: Vec::new(),
            disputed: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            positions: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: BookingOutcome) {
        self.positions.push((outcome.position, outcome.booking_id));
        self.discrepancies.extend(outcome.discrepancies);

        match outcome.status {
            OutcomeStatus::Synced { estimated, dispute } => {
                self.synced_count += 1;
                if estimated {
                    self.estimated_count += 1;
                }
                if dispute.is_some_and(|d| d.is_open()) {
                    self.disputed.push(outcome.booking_id);
                }
            }
            OutcomeStatus::Failed(failure) => {
                self.error_count += 1;
                self.failures.push(failure);
            }
        }
    }

    /// Close the run: count unlaunched candidates and restore candidate order.
    /// `stopped` is whether the stop signal ended the candidate stream; the run only
    /// counts as cancelled if that left candidates unstarted.
    pub fn finish(&mut self, stopped: bool) {
        let processed = self.synced_count + self.error_count;
        self.skipped_count = self.total_candidates.saturating_sub(processed);
        self.cancelled = stopped && self.skipped_count > 0;

        let order: std::collections::HashMap<BookingId, usize> = self.positions.iter()
            .map(|(pos, id)| (*id, *pos))
            .collect();
        let position_of = |id: &BookingId| order.get(id).copied().unwrap_or(usize::MAX);

        self.discrepancies.sort_by_key(|d| position_of(&d.booking_id));
        self.failures.sort_by_key(|f| position_of(&f.booking_id));
        self.disputed.sort_by_key(position_of);
        self.finished_at = Some(Utc::now());
    }

    pub fn discrepancy_count(&self) -> usize {
        self.discrepancies.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "candidates={} synced={} errors={} discrepancies={} estimated={} skipped={}{}",
            self.total_candidates,
            self.synced_count,
            self.error_count,
            self.discrepancy_count(),
            self.estimated_count,
            self.skipped_count,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}
