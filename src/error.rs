use serde::Serialize;
use thiserror::Error;
use crate::settlement::refund_policy::RefundState;
use crate::types::amount::Amount;
use crate::types::ids::{BookingId, PaymentId};

#[derive(Error, Debug)]
pub enum Error {
    // Ledger Client Errors
    #[error("Ledger fetch failed for {payment_id} ({kind:?}): {message}")]
    LedgerFetch {
        payment_id: PaymentId,
        kind: FetchErrorKind,
        message: String,
    },

    #[error("Ledger snapshot decode failed: {0}")]
    Decode(String),

    #[error("Booking {0} has no payment reference")]
    MissingPaymentReference(BookingId),

    // Calculation Errors
    #[error("Negative fee component {component}: {amount}")]
    NegativeFeeComponent {
        component: &'static str,
        amount: Amount,
    },

    #[error("Invariant violation: {0}")]
    InvariantViolation(InvariantViolation),

    #[error("Illegal refund transition: {from:?} -> {to:?}")]
    IllegalRefundTransition {
        from: RefundState,
        to: RefundState,
    },

    #[error("Overflow in {operation}")]
    Overflow { operation: String },

    // Booking Store Errors
    #[error("Candidate selection failed: {0}")]
    CandidateSelection(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("Store write failed for booking {booking_id}: {message}")]
    StoreWrite {
        booking_id: BookingId,
        message: String,
    },

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Retry classification for ledger fetch failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Timeout, rate limiting, 5xx. Safe to retry.
    Transient,
    /// Not found, malformed reference. Never retried.
    Permanent,
}

/// Coarse error category used in run reports and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    LedgerTransient,
    LedgerPermanent,
    Decode,
    Calculation,
    StoreWrite,
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::LedgerTransient => "ledger_transient",
            ErrorClass::LedgerPermanent => "ledger_permanent",
            ErrorClass::Decode => "decode",
            ErrorClass::Calculation => "calculation",
            ErrorClass::StoreWrite => "store_write",
            ErrorClass::Other => "other",
        }
    }
}

impl Error {
    pub fn transient(payment_id: &PaymentId, message: impl Into<String>) -> Self {
        Error::LedgerFetch {
            payment_id: payment_id.clone(),
            kind: FetchErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(payment_id: &PaymentId, message: impl Into<String>) -> Self {
        Error::LedgerFetch {
            payment_id: payment_id.clone(),
            kind: FetchErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Error::LedgerFetch { kind: FetchErrorKind::Transient, .. })
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::LedgerFetch { kind: FetchErrorKind::Transient, .. } => ErrorClass::LedgerTransient,
            Error::LedgerFetch { kind: FetchErrorKind::Permanent, .. }
            | Error::MissingPaymentReference(_) => ErrorClass::LedgerPermanent,
            Error::Decode(_) => ErrorClass::Decode,
            Error::NegativeFeeComponent { .. }
            | Error::InvariantViolation(_)
            | Error::IllegalRefundTransition { .. }
            | Error::Overflow { .. } => ErrorClass::Calculation,
            Error::StoreWrite { .. } | Error::BookingNotFound(_) => ErrorClass::StoreWrite,
            _ => ErrorClass::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub details: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.details)
    }
}
