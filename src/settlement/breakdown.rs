use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::types::amount::Amount;
use crate::types::ids::PaymentId;

/// Fee split recorded when the payment was captured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeIntent {
    pub service_fee: Amount,
    pub processing_fee_metadata_portion: Amount,
    pub partner_commission: Amount,
}

impl FeeIntent {
    pub fn new(service_fee: Amount, processing_fee_metadata_portion: Amount, partner_commission: Amount) -> Self {
        FeeIntent {
            service_fee,
            processing_fee_metadata_portion,
            partner_commission,
        }
    }

    pub fn gross_application_fee(&self) -> Result<Amount> {
        Amount::checked_sum([
            self.service_fee,
            self.processing_fee_metadata_portion,
            self.partner_commission,
        ])
        .ok_or_else(|| Error::Overflow { operation: "gross_application_fee".to_string() })
    }
}

/// Which ledger path produced `processor_fees`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// Application-fee balance transaction, corrected by the charge-level fee when available.
    ApplicationFeeLedger,
    /// Charge-level balance transaction only.
    ChargeLedger,
    /// No ledger fee data; fixed-rate model.
    Estimated,
    /// Zero gross application fee, nothing to compute.
    NoFee,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Verified,
    Estimated,
}

impl FeeSource {
    pub fn confidence(&self) -> Confidence {
        match self {
            FeeSource::Estimated => Confidence::Estimated,
            _ => Confidence::Verified,
        }
    }
}

/// Processor fee split by category. Sums to `FeeBreakdown::processor_fees`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorFeeComponents {
    pub processing_fee: Amount,
    pub tax: Amount,
    pub other: Amount,
}

impl ProcessorFeeComponents {
    /// `None` when the components overflow.
    pub fn total(&self) -> Option<Amount> {
        Amount::checked_sum([self.processing_fee, self.tax, self.other])
    }
}

/// What the platform nets from one payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub payment_id: PaymentId,
    pub currency: String,
    pub gross_amount: Amount,
    pub service_fee: Amount,
    pub processing_fee_metadata_portion: Amount,
    pub partner_commission: Amount,
    pub gross_application_fee: Amount,
    pub processor_fees: Amount,
    pub processor_fee_components: ProcessorFeeComponents,
    pub net_application_fee: Amount,
    pub net_commission: Amount,
    /// Payee's share, surfaced for reporting only.
    pub transfer_amount: Option<Amount>,
    pub source: FeeSource,
}

impl FeeBreakdown {
    pub fn confidence(&self) -> Confidence {
        self.source.confidence()
    }

    pub fn is_verified(&self) -> bool {
        self.confidence() == Confidence::Verified
    }
}
