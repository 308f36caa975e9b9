use serde::{Deserialize, Serialize};
use crate::settlement::breakdown::{FeeBreakdown, FeeIntent};
use crate::settlement::refund_policy::RefundState;
use crate::types::amount::Amount;
use crate::types::ids::{BookingId, PaymentId};

/// Fee fields as last persisted for a booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFees {
    pub gross_application_fee: Amount,
    pub net_application_fee: Amount,
    pub processor_fees: Amount,
    pub net_commission: Amount,
}

impl From<&FeeBreakdown> for StoredFees {
    fn from(b: &FeeBreakdown) -> Self {
        StoredFees {
            gross_application_fee: b.gross_application_fee,
            net_application_fee: b.net_application_fee,
            processor_fees: b.processor_fees,
            net_commission: b.net_commission,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub payment_id: Option<PaymentId>,
    pub fee_intent: FeeIntent,
    #[serde(default)]
    pub stored: StoredFees,
    #[serde(default)]
    pub refund_state: RefundState,
    #[serde(default)]
    pub refund_amount: Amount,
    #[serde(default)]
    pub counterparty_reversal_amount: Amount,
}

impl Booking {
    pub fn new(payment_id: PaymentId, fee_intent: FeeIntent) -> Self {
        Booking {
            id: BookingId::new(),
            payment_id: Some(payment_id),
            fee_intent,
            stored: StoredFees::default(),
            refund_state: RefundState::None,
            refund_amount: Amount::zero(),
            counterparty_reversal_amount: Amount::zero(),
        }
    }

    pub fn with_stored(mut self, stored: StoredFees) -> Self {
        self.stored = stored;
        self
    }
}
