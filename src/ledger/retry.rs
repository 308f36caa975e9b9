use std::time::Duration;
use async_trait::async_trait;
use crate::config::ledger::LedgerClientConfig;
use crate::error::Result;
use crate::interfaces::ledger_client::LedgerClient;
use crate::ledger::snapshot::LedgerSnapshot;
use crate::observability::metrics::LEDGER_FETCH_RETRIES;
use crate::types::ids::PaymentId;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LedgerClientConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LedgerClientConfig::default())
    }
}

/// Retries transient ledger failures with bounded exponential backoff.
/// Permanent failures and decode errors are returned immediately.
pub struct RetryingLedgerClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: LedgerClient> RetryingLedgerClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        RetryingLedgerClient { inner, policy }
    }
}

#[async_trait]
impl<C: LedgerClient> LedgerClient for RetryingLedgerClient<C> {
    async fn fetch_snapshot(&self, payment_id: &PaymentId) -> Result<LedgerSnapshot> {
        let mut attempt = 1;

        loop {
            match self.inner.fetch_snapshot(payment_id).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        payment_id = %payment_id,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Ledger fetch failed, retrying: {}", e
                    );
                    LEDGER_FETCH_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::interfaces::ledger_client::MockLedgerClient;
    use crate::types::amount::Amount;
    use mockall::Sequence;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn snapshot() -> LedgerSnapshot {
        LedgerSnapshot::new(PaymentId::new("pi_retry"), "usd", Amount::from_minor(1000))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
        assert_eq!(p.delay_for(5), Duration::from_millis(1000));
        assert_eq!(p.delay_for(40), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let mut inner = MockLedgerClient::new();
        let mut seq = Sequence::new();
        inner.expect_fetch_snapshot()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|id| Err(Error::transient(id, "503")));
        inner.expect_fetch_snapshot()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(snapshot()));

        let client = RetryingLedgerClient::new(inner, policy(3));
        let result = client.fetch_snapshot(&PaymentId::new("pi_retry")).await;
        assert_eq!(result.unwrap(), snapshot());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut inner = MockLedgerClient::new();
        inner.expect_fetch_snapshot()
            .times(3)
            .returning(|id| Err(Error::transient(id, "timeout")));

        let client = RetryingLedgerClient::new(inner, policy(3));
        let err = client.fetch_snapshot(&PaymentId::new("pi_retry")).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let mut inner = MockLedgerClient::new();
        inner.expect_fetch_snapshot()
            .times(1)
            .returning(|id| Err(Error::permanent(id, "not found")));

        let client = RetryingLedgerClient::new(inner, policy(5));
        let err = client.fetch_snapshot(&PaymentId::new("pi_missing")).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
