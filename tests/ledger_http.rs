use std::time::Duration;
use feerecon::config::ledger::LedgerClientConfig;
use feerecon::error::{Error, FetchErrorKind};
use feerecon::interfaces::ledger_client::LedgerClient;
use feerecon::ledger::http_client::HttpLedgerClient;
use feerecon::ledger::retry::{RetryPolicy, RetryingLedgerClient};
use feerecon::types::amount::Amount;
use feerecon::types::ids::PaymentId;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpLedgerClient {
    HttpLedgerClient::new(&LedgerClientConfig {
        base_url: server.uri(),
        api_key: "sk_test".to_string(),
        request_timeout_ms: 2_000,
        ..LedgerClientConfig::default()
    })
    .unwrap()
}

fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn payload() -> serde_json::Value {
    json!({
        "payment_id": "pi_http",
        "currency": "usd",
        "amount": 10000,
        "charge": {
            "id": "ch_1",
            "balance_transaction": {"fee": 350, "fee_details": [{"type": "stripe_fee", "amount": 350}]}
        }
    })
}

fn fetch_kind(err: Error) -> Option<FetchErrorKind> {
    match err {
        Error::LedgerFetch { kind, .. } => Some(kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_fetch_decodes_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/pi_http/snapshot"))
        .and(header("authorization", "Bearer sk_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch_snapshot(&PaymentId::new("pi_http")).await.unwrap();

    assert_eq!(snapshot.gross_amount, Amount::from_minor(10_000));
    assert_eq!(snapshot.charge_fee.unwrap().total, Amount::from_minor(350));
}

#[tokio::test]
async fn test_not_found_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such payment"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshot(&PaymentId::new("pi_missing")).await.unwrap_err();
    assert_eq!(fetch_kind(err), Some(FetchErrorKind::Permanent));
}

#[tokio::test]
async fn test_unavailable_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshot(&PaymentId::new("pi_http")).await.unwrap_err();
    assert_eq!(fetch_kind(err), Some(FetchErrorKind::Transient));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshot(&PaymentId::new("pi_http")).await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn test_mismatched_payment_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshot(&PaymentId::new("pi_other")).await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn test_malformed_reference_never_hits_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server).fetch_snapshot(&PaymentId::new("pi/../x")).await.unwrap_err();
    assert_eq!(fetch_kind(err), Some(FetchErrorKind::Permanent));
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .expect(1)
        .mount(&server)
        .await;

    let retrying = RetryingLedgerClient::new(client(&server), fast_retries(4));
    let snapshot = retrying.fetch_snapshot(&PaymentId::new("pi_http")).await.unwrap();
    assert_eq!(snapshot.payment_id, PaymentId::new("pi_http"));
}

#[tokio::test]
async fn test_retry_does_not_repeat_permanent_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let retrying = RetryingLedgerClient::new(client(&server), fast_retries(4));
    let err = retrying.fetch_snapshot(&PaymentId::new("pi_http")).await.unwrap_err();
    assert_eq!(fetch_kind(err), Some(FetchErrorKind::Permanent));
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let retrying = RetryingLedgerClient::new(client(&server), fast_retries(3));
    let err = retrying.fetch_snapshot(&PaymentId::new("pi_http")).await.unwrap_err();
    assert_eq!(fetch_kind(err), Some(FetchErrorKind::Transient));
}
