use serde::{Deserialize, Serialize};
use crate::error::{Error, InvariantViolation, Result};
use crate::invariants::checks::InvariantChecks;
use crate::ledger::snapshot::{DisputeStatus, LedgerSnapshot};
use crate::settlement::breakdown::FeeBreakdown;
use crate::store::booking::Booking;
use crate::types::amount::Amount;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    #[default]
    None,
    Full,
    Partial,
    #[serde(rename = "split_50_50")]
    Split5050,
}

impl RefundState {
    /// Legal moves: `None` to anything, `Partial`/`Split5050` to `Full`, and staying put.
    /// `Full` is terminal.
    pub fn transition_to(self, next: RefundState) -> Result<RefundState> {
        use RefundState::*;

        match (self, next) {
            (from, to) if from == to => Ok(to),
            (None, to) => Ok(to),
            (Partial, Full) | (Split5050, Full) => Ok(Full),
            (from, to) => Err(Error::IllegalRefundTransition { from, to }),
        }
    }
}

/// Breakdown after refund policy, plus the non-platform split of the payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedBreakdown {
    pub breakdown: FeeBreakdown,
    pub refund_state: RefundState,
    pub customer_refund: Amount,
    pub payee_reversal: Amount,
    /// Each party's half of the post-fee remainder, for 50/50 splits.
    pub split_share: Option<Amount>,
    pub dispute: Option<DisputeStatus>,
}

pub struct RefundPolicyResolver;

impl RefundPolicyResolver {
    /// Refund state implied by the stored policy and the ledger. A ledger that has refunded
    /// the whole gross amount makes the booking a full refund.
    pub fn classify(booking: &Booking, snapshot: &LedgerSnapshot) -> Result<RefundState> {
        let observed = if snapshot.is_fully_refunded()? {
            RefundState::Full
        } else {
            booking.refund_state
        };

        booking.refund_state.transition_to(observed)
    }

    pub fn resolve_refund_adjustment(
        booking: &Booking,
        snapshot: &LedgerSnapshot,
        breakdown: FeeBreakdown,
    ) -> Result<AdjustedBreakdown> {
        let state = Self::classify(booking, snapshot)?;
        let dispute = snapshot.dispute.as_ref().map(|d| d.status);

        let mut adjusted = AdjustedBreakdown {
            breakdown: breakdown.clone(),
            refund_state: state,
            customer_refund: Amount::zero(),
            payee_reversal: Amount::zero(),
            split_share: None,
            dispute,
        };

        match state {
            RefundState::None => {}
            RefundState::Full => {
                // A full refund returns all platform revenue
                adjusted.breakdown.net_application_fee = Amount::zero();
                adjusted.breakdown.net_commission = Amount::zero();
                adjusted.customer_refund = if booking.refund_amount.is_zero() {
                    snapshot.total_refunded()?
                } else {
                    booking.refund_amount
                };
                adjusted.payee_reversal = booking.counterparty_reversal_amount;
            }
            RefundState::Partial => {
                let remainder = refundable_remainder(&breakdown)?;
                let refunded = booking.refund_amount
                    .checked_add(booking.counterparty_reversal_amount)
                    .ok_or_else(|| overflow("partial_refund_total"))?;
                if refunded > remainder {
                    return Err(violation(
                        "partial_refund_within_remainder",
                        format!(
                            "refund {} + reversal {} exceeds post-fee remainder {}",
                            booking.refund_amount, booking.counterparty_reversal_amount, remainder
                        ),
                    ));
                }
                adjusted.customer_refund = booking.refund_amount;
                adjusted.payee_reversal = booking.counterparty_reversal_amount;
            }
            RefundState::Split5050 => {
                let remainder = refundable_remainder(&breakdown)?;
                let payee_share = Amount::from_minor(remainder.to_minor() / 2);
                let customer_share = remainder.checked_sub(payee_share)
                    .ok_or_else(|| overflow("split_customer_share"))?;

                if booking.refund_amount > customer_share {
                    return Err(violation(
                        "split_customer_share",
                        format!("customer refund {} exceeds half {}", booking.refund_amount, customer_share),
                    ));
                }
                if booking.counterparty_reversal_amount > payee_share {
                    return Err(violation(
                        "split_payee_share",
                        format!(
                            "payee reversal {} exceeds half {}",
                            booking.counterparty_reversal_amount, payee_share
                        ),
                    ));
                }

                if booking.refund_amount.is_zero() || booking.counterparty_reversal_amount.is_zero() {
                    // One party already settled; valid, kept visible for product follow-up
                    tracing::debug!(
                        booking_id = %booking.id,
                        customer_refund = %booking.refund_amount,
                        payee_reversal = %booking.counterparty_reversal_amount,
                        "Split refund with a zero half"
                    );
                }

                adjusted.customer_refund = booking.refund_amount;
                adjusted.payee_reversal = booking.counterparty_reversal_amount;
                adjusted.split_share = Some(customer_share);
            }
        }

        if adjusted.customer_refund.is_negative() || adjusted.payee_reversal.is_negative() {
            return Err(Error::NegativeFeeComponent {
                component: "refund_amount",
                amount: adjusted.customer_refund.min(adjusted.payee_reversal),
            });
        }

        InvariantChecks::check_refund_adjustment(&breakdown, &adjusted)?;
        Ok(adjusted)
    }
}

/// Part of the payment left after the platform keeps its full gross application fee.
fn refundable_remainder(breakdown: &FeeBreakdown) -> Result<Amount> {
    let remainder = breakdown.gross_amount
        .checked_sub(breakdown.gross_application_fee)
        .ok_or_else(|| overflow("refundable_remainder"))?;
    if remainder.is_negative() {
        return Err(violation(
            "fee_within_payment",
            format!(
                "gross application fee {} exceeds payment {}",
                breakdown.gross_application_fee, breakdown.gross_amount
            ),
        ));
    }
    Ok(remainder)
}

fn overflow(operation: &str) -> Error {
    Error::Overflow { operation: operation.to_string() }
}

fn violation(invariant: &'static str, details: String) -> Error {
    Error::InvariantViolation(InvariantViolation { invariant, details })
}
