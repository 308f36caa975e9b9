use std::time::Duration;
use async_trait::async_trait;
use reqwest::StatusCode;
use crate::config::ledger::LedgerClientConfig;
use crate::error::{Error, Result};
use crate::interfaces::ledger_client::LedgerClient;
use crate::ledger::snapshot::LedgerSnapshot;
use crate::ledger::wire::decode_snapshot;
use crate::observability::metrics::LEDGER_FETCH_LATENCY;
use crate::types::ids::PaymentId;

/// Ledger client talking to the processor's snapshot endpoint over HTTP.
pub struct HttpLedgerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpLedgerClient {
    pub fn new(config: &LedgerClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::ConfigError(format!("ledger http client: {}", e)))?;

        Ok(HttpLedgerClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn snapshot_url(&self, payment_id: &PaymentId) -> String {
        format!("{}/v1/payments/{}/snapshot", self.base_url, payment_id)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn fetch_snapshot(&self, payment_id: &PaymentId) -> Result<LedgerSnapshot> {
        if !payment_id.is_well_formed() {
            return Err(Error::permanent(payment_id, "malformed payment reference"));
        }

        let _timer = LEDGER_FETCH_LATENCY.start_timer();

        let mut request = self.client.get(self.snapshot_url(payment_id));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send()
            .await
            .map_err(|e| classify_transport_error(payment_id, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(payment_id, status, &body));
        }

        let body = response.bytes()
            .await
            .map_err(|e| Error::transient(payment_id, format!("reading body: {}", e)))?;

        let snapshot = decode_snapshot(&body)?;
        if snapshot.payment_id != *payment_id {
            return Err(Error::Decode(format!(
                "requested {} but ledger returned {}",
                payment_id, snapshot.payment_id
            )));
        }

        Ok(snapshot)
    }
}

fn classify_status(payment_id: &PaymentId, status: StatusCode, body: &str) -> Error {
    let message = format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>());

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Error::transient(payment_id, message),
        s if s.is_server_error() => Error::transient(payment_id, message),
        _ => Error::permanent(payment_id, message),
    }
}

fn classify_transport_error(payment_id: &PaymentId, e: reqwest::Error) -> Error {
    if e.is_builder() {
        Error::permanent(payment_id, e.to_string())
    } else {
        // timeouts, refused connections, resets
        Error::transient(payment_id, e.to_string())
    }
}
