use async_trait::async_trait;
use crate::error::Result;
use crate::ledger::snapshot::LedgerSnapshot;
use crate::types::ids::PaymentId;

/// Typed access to the payment processor's ledger.
///
/// Implementations classify failures as transient or permanent through
/// [`crate::error::FetchErrorKind`] so callers can decide whether to retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn fetch_snapshot(&self, payment_id: &PaymentId) -> Result<LedgerSnapshot>;
}
