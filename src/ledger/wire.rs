//! Strict decoder for the processor's payment snapshot payload.
//!
//! Every amount must be a JSON number in minor units. Integers are taken as-is, fractional
//! values are rounded half away from zero. String-encoded numbers, negative fees and fee
//! breakdowns that do not add up are rejected instead of defaulted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Number;
use crate::error::{Error, Result};
use crate::ledger::snapshot::*;
use crate::types::amount::Amount;
use crate::types::ids::PaymentId;

#[derive(Debug, Deserialize)]
struct WireSnapshot {
    payment_id: String,
    currency: String,
    amount: Number,
    #[serde(default)]
    charge: Option<WireCharge>,
    #[serde(default)]
    application_fee: Option<WireApplicationFee>,
    #[serde(default)]
    transfer: Option<WireTransfer>,
    #[serde(default)]
    refunds: Vec<WireRefund>,
    #[serde(default)]
    dispute: Option<WireDispute>,
}

#[derive(Debug, Deserialize)]
struct WireCharge {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    balance_transaction: Option<WireChargeBalanceTransaction>,
}

#[derive(Debug, Deserialize)]
struct WireChargeBalanceTransaction {
    fee: Number,
    #[serde(default)]
    fee_details: Vec<WireFeeDetail>,
}

#[derive(Debug, Deserialize)]
struct WireFeeDetail {
    #[serde(rename = "type")]
    kind: String,
    amount: Number,
}

#[derive(Debug, Deserialize)]
struct WireApplicationFee {
    id: String,
    amount: Number,
    balance_transaction: WireApplicationFeeBalanceTransaction,
}

#[derive(Debug, Deserialize)]
struct WireApplicationFeeBalanceTransaction {
    fee: Number,
    net: Number,
}

#[derive(Debug, Deserialize)]
struct WireTransfer {
    id: String,
    amount: Number,
    #[serde(default)]
    destination: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRefund {
    amount: Number,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct WireDispute {
    amount: Number,
    status: DisputeStatus,
}

/// Decode a raw response body into a snapshot.
pub fn decode_snapshot(body: &[u8]) -> Result<LedgerSnapshot> {
    let wire: WireSnapshot = serde_json::from_slice(body)
        .map_err(|e| Error::Decode(e.to_string()))?;
    wire.into_snapshot()
}

/// Decode an already-parsed JSON value into a snapshot.
pub fn decode_value(value: serde_json::Value) -> Result<LedgerSnapshot> {
    let wire: WireSnapshot = serde_json::from_value(value)
        .map_err(|e| Error::Decode(e.to_string()))?;
    wire.into_snapshot()
}

impl WireSnapshot {
    fn into_snapshot(self) -> Result<LedgerSnapshot> {
        let payment_id = PaymentId::new(self.payment_id);
        if !payment_id.is_well_formed() {
            return Err(Error::Decode(format!("malformed payment id: {:?}", payment_id.as_str())));
        }

        let currency = decode_currency(&self.currency)?;
        let gross_amount = non_negative("amount", &self.amount)?;

        let charge_fee = match self.charge.and_then(|c| c.balance_transaction) {
            Some(bt) => Some(decode_charge_fee(bt)?),
            None => None,
        };

        let application_fee_ledger_entry = match self.application_fee {
            Some(fee) => Some(ApplicationFeeEntry {
                id: fee.id,
                amount: non_negative("application_fee.amount", &fee.amount)?,
                fee: non_negative("application_fee.fee", &fee.balance_transaction.fee)?,
                net: amount("application_fee.net", &fee.balance_transaction.net)?,
            }),
            None => None,
        };

        let transfer = match self.transfer {
            Some(t) => Some(Transfer {
                id: t.id,
                amount: non_negative("transfer.amount", &t.amount)?,
                destination: t.destination,
            }),
            None => None,
        };

        let mut refunds = self.refunds.into_iter()
            .map(|r| {
                let amount = non_negative("refund.amount", &r.amount)?;
                let created_at = DateTime::<Utc>::from_timestamp(r.created, 0)
                    .ok_or_else(|| Error::Decode(format!("invalid refund timestamp: {}", r.created)))?;
                Ok(Refund { amount, created_at })
            })
            .collect::<Result<Vec<_>>>()?;
        if Amount::checked_sum(refunds.iter().map(|r| r.amount)).is_none() {
            return Err(Error::Decode("refund amounts overflow when summed".to_string()));
        }
        refunds.sort_by_key(|r| r.created_at);

        let dispute = match self.dispute {
            Some(d) => Some(Dispute {
                amount: non_negative("dispute.amount", &d.amount)?,
                status: d.status,
            }),
            None => None,
        };

        Ok(LedgerSnapshot {
            payment_id,
            currency,
            gross_amount,
            charge_fee,
            application_fee_ledger_entry,
            transfer,
            refunds,
            dispute,
        })
    }
}

fn decode_charge_fee(bt: WireChargeBalanceTransaction) -> Result<ChargeFee> {
    let total = non_negative("charge.fee", &bt.fee)?;

    if bt.fee_details.is_empty() {
        return Ok(ChargeFee::flat(total));
    }

    let components = bt.fee_details.iter()
        .map(|d| {
            Ok(FeeComponent {
                kind: component_kind(&d.kind),
                amount: non_negative("charge.fee_details.amount", &d.amount)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let fee = ChargeFee::from_components(components)
        .map_err(|_| Error::Decode("charge fee details overflow when summed".to_string()))?;
    if fee.total != total {
        return Err(Error::Decode(format!(
            "charge fee details sum to {} but fee is {}",
            fee.total, total
        )));
    }

    Ok(fee)
}

fn component_kind(kind: &str) -> FeeComponentKind {
    match kind {
        "stripe_fee" | "processing_fee" => FeeComponentKind::ProcessingFee,
        "tax" | "vat" => FeeComponentKind::Tax,
        _ => FeeComponentKind::Other,
    }
}

fn decode_currency(raw: &str) -> Result<String> {
    if raw.len() != 3 || !raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::Decode(format!("invalid currency code: {:?}", raw)));
    }
    Ok(raw.to_ascii_lowercase())
}

fn amount(field: &'static str, value: &Number) -> Result<Amount> {
    if let Some(v) = value.as_i64() {
        return Ok(Amount::from_minor(v));
    }

    match value.as_f64() {
        Some(v) => Amount::from_minor_f64(v),
        None => Err(Error::Decode(format!("{} is not representable: {}", field, value))),
    }
}

fn non_negative(field: &'static str, value: &Number) -> Result<Amount> {
    let amount = amount(field, value)?;
    if amount.is_negative() {
        return Err(Error::Decode(format!("{} must not be negative: {}", field, amount)));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> serde_json::Value {
        json!({
            "payment_id": "pi_123",
            "currency": "USD",
            "amount": 10000,
            "charge": {
                "id": "ch_1",
                "balance_transaction": {
                    "fee": 350,
                    "fee_details": [
                        {"type": "stripe_fee", "amount": 320},
                        {"type": "tax", "amount": 30}
                    ]
                }
            },
            "application_fee": {
                "id": "fee_1",
                "amount": 2000,
                "balance_transaction": {"fee": 58, "net": 1942}
            },
            "transfer": {"id": "tr_1", "amount": 8000, "destination": "acct_1"},
            "refunds": [
                {"amount": 200, "created": 1_700_000_500i64},
                {"amount": 100, "created": 1_700_000_000i64}
            ],
            "dispute": {"amount": 10000, "status": "needs_response"}
        })
    }

    #[test]
    fn test_decode_full_snapshot() {
        let snapshot = decode_value(full_payload()).unwrap();

        assert_eq!(snapshot.payment_id.as_str(), "pi_123");
        assert_eq!(snapshot.currency, "usd");
        assert_eq!(snapshot.gross_amount, Amount::from_minor(10000));

        let fee = snapshot.charge_fee.as_ref().unwrap();
        assert_eq!(fee.total, Amount::from_minor(350));
        assert_eq!(fee.component_total(FeeComponentKind::ProcessingFee).unwrap(), Amount::from_minor(320));
        assert_eq!(fee.component_total(FeeComponentKind::Tax).unwrap(), Amount::from_minor(30));

        let app_fee = snapshot.application_fee_ledger_entry.as_ref().unwrap();
        assert_eq!(app_fee.net, Amount::from_minor(1942));
        assert_eq!(snapshot.transfer.as_ref().unwrap().amount, Amount::from_minor(8000));

        // refunds come back ordered by creation time
        assert_eq!(snapshot.refunds[0].amount, Amount::from_minor(100));
        assert_eq!(snapshot.refunds[1].amount, Amount::from_minor(200));
        assert_eq!(snapshot.total_refunded().unwrap(), Amount::from_minor(300));
        assert_eq!(snapshot.dispute.as_ref().unwrap().status, DisputeStatus::NeedsResponse);
    }

    #[test]
    fn test_decode_minimal_snapshot() {
        let snapshot = decode_value(json!({
            "payment_id": "pi_min",
            "currency": "eur",
            "amount": 500
        })).unwrap();

        assert!(snapshot.charge_fee.is_none());
        assert!(snapshot.application_fee_ledger_entry.is_none());
        assert!(snapshot.refunds.is_empty());
    }

    #[test]
    fn test_fractional_amounts_round_half_away_from_zero() {
        let mut payload = full_payload();
        payload["charge"]["balance_transaction"] = json!({"fee": 349.5});
        let snapshot = decode_value(payload).unwrap();
        assert_eq!(snapshot.charge_fee.unwrap().total, Amount::from_minor(350));
    }

    #[test]
    fn test_rejects_string_encoded_amounts() {
        let mut payload = full_payload();
        payload["amount"] = json!("10000");
        assert!(matches!(decode_value(payload), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_fee_details_that_do_not_add_up() {
        let mut payload = full_payload();
        payload["charge"]["balance_transaction"]["fee"] = json!(400);
        assert!(matches!(decode_value(payload), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_negative_fee() {
        let mut payload = full_payload();
        payload["charge"]["balance_transaction"] = json!({"fee": -1});
        assert!(matches!(decode_value(payload), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_bad_currency_and_payment_id() {
        let mut payload = full_payload();
        payload["currency"] = json!("dollars");
        assert!(decode_value(payload).is_err());

        let mut payload = full_payload();
        payload["payment_id"] = json!("../etc");
        assert!(decode_value(payload).is_err());
    }

    #[test]
    fn test_charge_without_balance_transaction_has_no_fee() {
        let mut payload = full_payload();
        payload["charge"] = json!({"id": "ch_pending"});
        let snapshot = decode_value(payload).unwrap();
        assert!(snapshot.charge_fee.is_none());
    }

    #[test]
    fn test_rejects_refunds_whose_total_overflows() {
        let mut payload = full_payload();
        payload["refunds"] = json!([
            {"amount": i64::MAX, "created": 1_700_000_000i64},
            {"amount": 1, "created": 1_700_000_500i64}
        ]);
        assert!(matches!(decode_value(payload), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_fee_details_whose_total_overflows() {
        let mut payload = full_payload();
        payload["charge"]["balance_transaction"] = json!({
            "fee": 350,
            "fee_details": [
                {"type": "stripe_fee", "amount": i64::MAX},
                {"type": "tax", "amount": i64::MAX}
            ]
        });
        assert!(matches!(decode_value(payload), Err(Error::Decode(_))));
    }
}
