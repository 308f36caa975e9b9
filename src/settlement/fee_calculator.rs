use crate::config::fees::FeeEstimateConfig;
use crate::error::{Error, Result};
use crate::invariants::checks::InvariantChecks;
use crate::ledger::snapshot::{ChargeFee, FeeComponentKind, LedgerSnapshot};
use crate::settlement::breakdown::{FeeBreakdown, FeeIntent, FeeSource, ProcessorFeeComponents};
use crate::types::amount::Amount;

/// Turns a ledger snapshot and the recorded fee intent into a verified (or explicitly
/// estimated) fee breakdown. Pure: no I/O, safe to share across workers.
#[derive(Clone, Debug, Default)]
pub struct FeeCalculator {
    estimate: FeeEstimateConfig,
}

impl FeeCalculator {
    pub fn new(estimate: FeeEstimateConfig) -> Self {
        FeeCalculator { estimate }
    }

    /// Compute the breakdown for one payment.
    ///
    /// Fee source priority, most trusted first:
    /// 1. application-fee balance transaction, with processor fees overridden by the
    ///    charge-level fee when present (the processor charges on the full amount)
    /// 2. charge-level fee alone
    /// 3. the configured percentage + flat model, flagged `Estimated`
    pub fn compute_breakdown(
        &self,
        snapshot: &LedgerSnapshot,
        intent: &FeeIntent,
    ) -> Result<FeeBreakdown> {
        InvariantChecks::check_fee_intent(intent)?;

        let gross = intent.gross_application_fee()?;

        let mut breakdown = FeeBreakdown {
            payment_id: snapshot.payment_id.clone(),
            currency: snapshot.currency.clone(),
            gross_amount: snapshot.gross_amount,
            service_fee: intent.service_fee,
            processing_fee_metadata_portion: intent.processing_fee_metadata_portion,
            partner_commission: intent.partner_commission,
            gross_application_fee: gross,
            processor_fees: Amount::zero(),
            processor_fee_components: ProcessorFeeComponents::default(),
            net_application_fee: Amount::zero(),
            net_commission: Amount::zero(),
            transfer_amount: snapshot.transfer.as_ref().map(|t| t.amount),
            source: FeeSource::NoFee,
        };

        // No-op payment: nothing retained, nothing to estimate
        if gross.is_zero() {
            return Ok(breakdown);
        }

        let (processor_fees, components, source) = match (
            &snapshot.application_fee_ledger_entry,
            &snapshot.charge_fee,
        ) {
            (Some(_), Some(charge)) => (
                charge.total,
                charge_components(charge)?,
                FeeSource::ApplicationFeeLedger,
            ),
            (Some(entry), None) => {
                // Fees implied by the ledger's net against the locally recorded gross
                let implied = gross.checked_sub(entry.net)
                    .ok_or_else(|| Error::Overflow { operation: "implied_processor_fees".to_string() })?;
                (implied, processing_only(implied), FeeSource::ApplicationFeeLedger)
            }
            (None, Some(charge)) => (
                charge.total,
                charge_components(charge)?,
                FeeSource::ChargeLedger,
            ),
            (None, None) => {
                let estimated = self.estimate_processor_fees(gross)?;
                tracing::debug!(
                    payment_id = %snapshot.payment_id,
                    gross_application_fee = %gross,
                    estimated_fees = %estimated,
                    "No ledger fee data, using estimate"
                );
                (estimated, processing_only(estimated), FeeSource::Estimated)
            }
        };

        if processor_fees.is_negative() {
            return Err(Error::NegativeFeeComponent {
                component: "processor_fees",
                amount: processor_fees,
            });
        }

        let net = gross.checked_sub(processor_fees)
            .ok_or_else(|| Error::Overflow { operation: "net_application_fee".to_string() })?;

        breakdown.processor_fees = processor_fees;
        breakdown.processor_fee_components = components;
        breakdown.net_application_fee = net;
        breakdown.net_commission = Self::apportion_commission(net, intent.partner_commission, gross)?;
        breakdown.source = source;

        InvariantChecks::check_breakdown(&breakdown)?;
        Ok(breakdown)
    }

    /// `net * partner_commission / gross`, zero when `gross` is zero.
    pub fn apportion_commission(net: Amount, partner_commission: Amount, gross: Amount) -> Result<Amount> {
        if gross.is_zero() {
            return Ok(Amount::zero());
        }

        net.mul_div(partner_commission.to_minor(), gross.to_minor())
            .ok_or_else(|| Error::Overflow { operation: "net_commission".to_string() })
    }

    fn estimate_processor_fees(&self, gross: Amount) -> Result<Amount> {
        gross.apply_bps(self.estimate.percentage_bps)
            .and_then(|pct| pct.checked_add(self.estimate.flat_fee))
            .ok_or_else(|| Error::Overflow { operation: "estimate_processor_fees".to_string() })
    }
}

fn charge_components(charge: &ChargeFee) -> Result<ProcessorFeeComponents> {
    Ok(ProcessorFeeComponents {
        processing_fee: charge.component_total(FeeComponentKind::ProcessingFee)?,
        tax: charge.component_total(FeeComponentKind::Tax)?,
        other: charge.component_total(FeeComponentKind::Other)?,
    })
}

fn processing_only(amount: Amount) -> ProcessorFeeComponents {
    ProcessorFeeComponents {
        processing_fee: amount,
        ..Default::default()
    }
}
