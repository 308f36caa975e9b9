use std::collections::HashSet;
use async_trait::async_trait;
use crate::error::Result;
use crate::settlement::refund_policy::AdjustedBreakdown;
use crate::store::booking::Booking;
use crate::types::ids::BookingId;

/// Read/write access to the locally persisted booking fee fields.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Bookings eligible for reconciliation: every booking with a payment reference when
    /// `ids` is `None`, otherwise the requested subset.
    async fn list_candidates(&self, ids: Option<&HashSet<BookingId>>) -> Result<Vec<Booking>>;

    /// Overwrite the fee fields and resolved refund state of one booking.
    async fn update_fees(&self, booking_id: BookingId, adjusted: &AdjustedBreakdown) -> Result<()>;
}
