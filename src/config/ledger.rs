use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Snapshot cache TTL; 0 disables caching.
    pub cache_ttl_secs: u64,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        LedgerClientConfig {
            base_url: "http://127.0.0.1:8088".to_string(),
            api_key: String::new(),
            request_timeout_ms: 10_000,
            max_attempts: 4,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 5_000,
            cache_ttl_secs: 0,
        }
    }
}
