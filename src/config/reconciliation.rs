use serde::{Deserialize, Serialize};
use crate::types::amount::Amount;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Concurrent ledger fetches; 1 runs bookings sequentially in store order.
    pub max_concurrency: usize,
    /// Differences up to and including this are treated as rounding noise.
    pub epsilon: Amount,
    /// Stop launching new bookings after this many seconds; 0 means no limit.
    pub run_timeout_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        ReconciliationConfig {
            max_concurrency: 8,
            epsilon: Amount::from_minor(1),
            run_timeout_secs: 0,
        }
    }
}
