use crate::error::{Error, InvariantViolation, Result};
use crate::settlement::breakdown::{FeeBreakdown, FeeIntent};
use crate::settlement::refund_policy::{AdjustedBreakdown, RefundState};
use crate::types::amount::Amount;

pub struct InvariantChecks;

impl InvariantChecks {
    /// Fee intent components must be non-negative
    pub fn check_fee_intent(intent: &FeeIntent) -> Result<()> {
        let components = [
            ("service_fee", intent.service_fee),
            ("processing_fee_metadata_portion", intent.processing_fee_metadata_portion),
            ("partner_commission", intent.partner_commission),
        ];

        for (component, amount) in components {
            if amount.is_negative() {
                return Err(Error::NegativeFeeComponent { component, amount });
            }
        }

        Ok(())
    }

    /// Check the arithmetic of a computed breakdown
    pub fn check_breakdown(breakdown: &FeeBreakdown) -> Result<()> {
        let expected_gross = Amount::checked_sum([
            breakdown.service_fee,
            breakdown.processing_fee_metadata_portion,
            breakdown.partner_commission,
        ]);

        if expected_gross != Some(breakdown.gross_application_fee) {
            return Err(violation(
                "gross_application_fee_sum",
                format!(
                    "gross_application_fee {} != components sum {:?}",
                    breakdown.gross_application_fee, expected_gross
                ),
            ));
        }

        if breakdown.processor_fees.is_negative() {
            return Err(Error::NegativeFeeComponent {
                component: "processor_fees",
                amount: breakdown.processor_fees,
            });
        }

        let components_total = breakdown.processor_fee_components.total();
        if components_total != Some(breakdown.processor_fees) {
            return Err(violation(
                "processor_fee_components_sum",
                format!(
                    "components sum {:?} != processor_fees {}",
                    components_total, breakdown.processor_fees
                ),
            ));
        }

        let expected_net = breakdown.gross_application_fee.checked_sub(breakdown.processor_fees);
        if expected_net != Some(breakdown.net_application_fee) {
            return Err(violation(
                "net_application_fee",
                format!(
                    "net {} != gross {} - processor fees {}",
                    breakdown.net_application_fee,
                    breakdown.gross_application_fee,
                    breakdown.processor_fees
                ),
            ));
        }

        if breakdown.net_application_fee > breakdown.gross_application_fee {
            return Err(violation(
                "net_not_above_gross",
                format!(
                    "net {} exceeds gross {}",
                    breakdown.net_application_fee, breakdown.gross_application_fee
                ),
            ));
        }

        if breakdown.gross_application_fee.is_zero() && !breakdown.net_commission.is_zero() {
            return Err(violation(
                "zero_fee_commission",
                format!("net_commission {} with zero gross fee", breakdown.net_commission),
            ));
        }

        Ok(())
    }

    /// Check the refund adjustment against the unadjusted breakdown
    pub fn check_refund_adjustment(
        computed: &FeeBreakdown,
        adjusted: &AdjustedBreakdown,
    ) -> Result<()> {
        let result = &adjusted.breakdown;

        match adjusted.refund_state {
            RefundState::Full => {
                if result.net_application_fee != Amount::zero() || result.net_commission != Amount::zero() {
                    return Err(violation(
                        "full_refund_zeroing",
                        format!(
                            "full refund left net_application_fee={} net_commission={}",
                            result.net_application_fee, result.net_commission
                        ),
                    ));
                }
            }
            RefundState::None | RefundState::Partial | RefundState::Split5050 => {
                if result.gross_application_fee != computed.gross_application_fee
                    || result.net_application_fee != computed.net_application_fee
                    || result.net_commission != computed.net_commission
                {
                    return Err(violation(
                        "fee_retention",
                        format!(
                            "{:?} refund changed platform fee: net {} -> {}",
                            adjusted.refund_state,
                            computed.net_application_fee,
                            result.net_application_fee
                        ),
                    ));
                }
            }
        }

        if adjusted.customer_refund.is_negative() || adjusted.payee_reversal.is_negative() {
            return Err(violation(
                "non_negative_refunds",
                format!(
                    "customer_refund={} payee_reversal={}",
                    adjusted.customer_refund, adjusted.payee_reversal
                ),
            ));
        }

        Ok(())
    }
}

fn violation(invariant: &'static str, details: String) -> Error {
    Error::InvariantViolation(InvariantViolation { invariant, details })
}
