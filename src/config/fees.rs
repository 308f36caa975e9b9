use serde::{Deserialize, Serialize};
use crate::types::amount::Amount;

/// Fallback processor fee model, used only when the ledger exposes no fee data.
/// Results built from it are flagged as estimates.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeEstimateConfig {
    pub percentage_bps: u32,
    pub flat_fee: Amount,
}

impl Default for FeeEstimateConfig {
    fn default() -> Self {
        FeeEstimateConfig {
            percentage_bps: 290,              // 2.9%
            flat_fee: Amount::from_minor(30), // 30 minor units per transaction
        }
    }
}
