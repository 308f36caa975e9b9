pub mod booking_store;
pub mod ledger_client;
