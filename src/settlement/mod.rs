pub mod breakdown;
pub mod fee_calculator;
pub mod reconciliation;
pub mod refund_policy;
pub mod report;
