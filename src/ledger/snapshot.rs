use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::types::amount::Amount;
use crate::types::ids::PaymentId;

/// Point-in-time view of one payment as recorded by the processor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub payment_id: PaymentId,
    pub currency: String,
    pub gross_amount: Amount,
    pub charge_fee: Option<ChargeFee>,
    pub application_fee_ledger_entry: Option<ApplicationFeeEntry>,
    pub transfer: Option<Transfer>,
    pub refunds: Vec<Refund>,
    pub dispute: Option<Dispute>,
}

impl LedgerSnapshot {
    /// Bare snapshot with no fee objects, refunds or dispute.
    pub fn new(payment_id: PaymentId, currency: impl Into<String>, gross_amount: Amount) -> Self {
        LedgerSnapshot {
            payment_id,
            currency: currency.into(),
            gross_amount,
            charge_fee: None,
            application_fee_ledger_entry: None,
            transfer: None,
            refunds: Vec::new(),
            dispute: None,
        }
    }

    pub fn total_refunded(&self) -> Result<Amount> {
        Amount::checked_sum(self.refunds.iter().map(|r| r.amount))
            .ok_or_else(|| overflow("total_refunded"))
    }

    pub fn is_fully_refunded(&self) -> Result<bool> {
        Ok(!self.gross_amount.is_zero() && self.total_refunded()? >= self.gross_amount)
    }
}

/// Processor fee charged on the full transaction amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeFee {
    pub total: Amount,
    pub components: Vec<FeeComponent>,
}

impl ChargeFee {
    pub fn from_components(components: Vec<FeeComponent>) -> Result<Self> {
        let total = Amount::checked_sum(components.iter().map(|c| c.amount))
            .ok_or_else(|| overflow("charge_fee_total"))?;
        Ok(ChargeFee { total, components })
    }

    /// Undecomposed fee, booked entirely as processing fee.
    pub fn flat(total: Amount) -> Self {
        ChargeFee {
            total,
            components: vec![FeeComponent {
                kind: FeeComponentKind::ProcessingFee,
                amount: total,
            }],
        }
    }

    pub fn component_total(&self, kind: FeeComponentKind) -> Result<Amount> {
        let amounts = self.components.iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.amount);
        Amount::checked_sum(amounts).ok_or_else(|| overflow("charge_fee_component_total"))
    }
}

fn overflow(operation: &str) -> Error {
    Error::Overflow { operation: operation.to_string() }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeComponent {
    pub kind: FeeComponentKind,
    pub amount: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeComponentKind {
    ProcessingFee,
    Tax,
    Other,
}

/// Balance transaction of the application fee collected by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFeeEntry {
    pub id: String,
    pub amount: Amount,
    pub fee: Amount,
    /// Amount retained by the platform before the charge-level fee correction.
    pub net: Amount,
}

/// Money moved to the payee's connected account. Never part of platform earnings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub amount: Amount,
    pub destination: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub amount: Amount,
    pub status: DisputeStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    WarningNeedsResponse,
    WarningUnderReview,
    WarningClosed,
    NeedsResponse,
    UnderReview,
    Won,
    Lost,
}

impl DisputeStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, DisputeStatus::WarningClosed | DisputeStatus::Won | DisputeStatus::Lost)
    }
}
