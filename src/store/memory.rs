use std::collections::HashSet;
use std::path::Path;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use crate::error::{Error, Result};
use crate::interfaces::booking_store::BookingStore;
use crate::settlement::refund_policy::AdjustedBreakdown;
use crate::store::booking::{Booking, StoredFees};
use crate::types::ids::BookingId;

/// Booking store held in memory, optionally loaded from and saved to a JSON file.
#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: DashMap<BookingId, Booking>,
    // Insertion order, so listing is deterministic
    order: std::sync::RwLock<Vec<BookingId>>,
    failing_writes: DashSet<BookingId>,
    fail_listing: std::sync::atomic::AtomicBool,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bookings(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let store = Self::new();
        for booking in bookings {
            store.insert(booking);
        }
        store
    }

    pub fn insert(&self, booking: Booking) {
        let id = booking.id;
        if self.bookings.insert(id, booking).is_none() {
            // Index stays complete even if a reader panicked while holding it
            self.order.write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(id);
        }
    }

    pub fn get(&self, id: BookingId) -> Option<Booking> {
        self.bookings.get(&id).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    /// Make every subsequent write to `id` fail.
    pub fn fail_writes_for(&self, id: BookingId) {
        self.failing_writes.insert(id);
    }

    /// Make candidate listing fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let bookings: Vec<Booking> = serde_json::from_slice(&raw)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        Ok(Self::with_bookings(bookings))
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let bookings = self.list_all()?;
        let raw = serde_json::to_vec_pretty(&bookings)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Every booking, in insertion order.
    pub fn list_all(&self) -> Result<Vec<Booking>> {
        let order = self.order.read()
            .map_err(|_| Error::CandidateSelection("booking index lock poisoned".to_string()))?
            .clone();

        Ok(order.iter()
            .filter_map(|id| self.get(*id))
            .collect())
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn list_candidates(&self, ids: Option<&HashSet<BookingId>>) -> Result<Vec<Booking>> {
        if self.fail_listing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::CandidateSelection("booking store unavailable".to_string()));
        }

        let candidates = self.list_all()?
            .into_iter()
            .filter(|b| match ids {
                Some(ids) => ids.contains(&b.id),
                None => b.payment_id.is_some(),
            })
            .collect();

        Ok(candidates)
    }

    async fn update_fees(&self, booking_id: BookingId, adjusted: &AdjustedBreakdown) -> Result<()> {
        if self.failing_writes.contains(&booking_id) {
            return Err(Error::StoreWrite {
                booking_id,
                message: "write rejected".to_string(),
            });
        }

        let mut booking = self.bookings.get_mut(&booking_id)
            .ok_or(Error::BookingNotFound(booking_id))?;

        booking.stored = StoredFees::from(&adjusted.breakdown);
        booking.refund_state = adjusted.refund_state;
        Ok(())
    }
}
