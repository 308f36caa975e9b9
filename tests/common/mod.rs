#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use feerecon::error::{Error, Result};
use feerecon::interfaces::ledger_client::LedgerClient;
use feerecon::ledger::snapshot::{ChargeFee, LedgerSnapshot};
use feerecon::settlement::breakdown::FeeIntent;
use feerecon::store::booking::{Booking, StoredFees};
use feerecon::types::amount::Amount;
use feerecon::types::ids::PaymentId;

pub fn amt(v: i64) -> Amount {
    Amount::from_minor(v)
}

/// 700 service + 300 processing portion + 1000 partner commission.
pub fn standard_intent() -> FeeIntent {
    FeeIntent::new(amt(700), amt(300), amt(1000))
}

/// 10000 payment with a 350 charge-level processor fee.
pub fn standard_snapshot(payment_id: &str) -> LedgerSnapshot {
    let mut snap = LedgerSnapshot::new(PaymentId::new(payment_id), "usd", amt(10_000));
    snap.charge_fee = Some(ChargeFee::flat(amt(350)));
    snap
}

pub fn booking(payment_id: &str, net_application_fee: i64, net_commission: i64) -> Booking {
    Booking::new(PaymentId::new(payment_id), standard_intent()).with_stored(StoredFees {
        gross_application_fee: amt(2000),
        net_application_fee: amt(net_application_fee),
        processor_fees: Amount::zero(),
        net_commission: amt(net_commission),
    })
}

#[derive(Clone)]
pub enum Script {
    Snapshot(LedgerSnapshot),
    Slow(Duration, LedgerSnapshot),
    Transient,
    Permanent,
}

/// Ledger client answering from a fixed script, recording call order and peak concurrency.
#[derive(Default)]
pub struct ScriptedLedger {
    scripts: HashMap<PaymentId, Script>,
    calls: Mutex<Vec<PaymentId>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, payment_id: &str, script: Script) -> Self {
        self.scripts.insert(PaymentId::new(payment_id), script);
        self
    }

    pub fn calls(&self) -> Vec<PaymentId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn fetch_snapshot(&self, payment_id: &PaymentId) -> Result<LedgerSnapshot> {
        self.calls.lock().unwrap().push(payment_id.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match self.scripts.get(payment_id).cloned() {
            Some(Script::Snapshot(snap)) => Ok(snap),
            Some(Script::Slow(delay, snap)) => {
                tokio::time::sleep(delay).await;
                Ok(snap)
            }
            Some(Script::Transient) => Err(Error::transient(payment_id, "HTTP 503")),
            Some(Script::Permanent) | None => Err(Error::permanent(payment_id, "HTTP 404: no such payment")),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
