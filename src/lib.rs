pub mod types;
pub mod settlement;
pub mod invariants;
pub mod ledger;
pub mod store;
pub mod error;
pub mod config;
pub mod observability;
pub mod interfaces;
pub mod api;

// Config environment used when none is given on the command line
pub const DEFAULT_ENV: &str = "development";
