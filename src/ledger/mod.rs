pub mod cache;
pub mod http_client;
pub mod retry;
pub mod snapshot;
pub mod wire;
