//! End-to-end: scheduler -> real HTTP client -> local gateway double.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::DateTime;
use pushdeck_core::{CredentialBundle, Endpoint, Notification, SigningKeyCredential};
use pushdeck_dispatch::{
    ApnsClientFactory, ClientBuildError, DispatchError, DispatchOutcome, DispatchRequest,
    DispatchScheduler, ResultLog, SchedulerConfig,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNING_KEY: &[u8] = include_bytes!("../../pushdeck-gateway/tests/fixtures/signing_key.p8");

const ACCEPTED: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const BAD_TOKEN: &str = "2222222222222222222222222222222222222222222222222222222222222222";
const UNREGISTERED: &str = "3333333333333333333333333333333333333333333333333333333333333333";

fn credentials() -> Arc<CredentialBundle> {
    Arc::new(SigningKeyCredential::new(SIGNING_KEY, "ABC123DEFG", "TEAM123456").into())
}

fn endpoint(server: &MockServer) -> Endpoint {
    let address = server.address();
    Endpoint::new(address.ip().to_string(), address.port())
}

fn notification(token: &str) -> Notification {
    Notification::new(token, "com.example.app", r#"{"aps":{"alert":"hi"}}"#)
}

async fn gateway() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/3/device/{ACCEPTED}")))
        .and(header("apns-topic", "com.example.app"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("apns-id", "0191b6a4-7c2e-7d3a-9b1e-5f6a7b8c9d0e"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/3/device/{BAD_TOKEN}")))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"reason":"BadDeviceToken"}"#))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/3/device/{UNREGISTERED}")))
        .respond_with(
            ResponseTemplate::new(410)
                .set_body_string(r#"{"reason":"Unregistered","timestamp":1700000000000}"#),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn outcomes_arrive_in_submission_order() {
    let server = gateway().await;
    let factory = Arc::new(ApnsClientFactory::new(Duration::from_secs(5)).plaintext());
    let (scheduler, mut completions) = DispatchScheduler::new(factory, SchedulerConfig::default());

    let mut tickets = Vec::new();
    for token in [ACCEPTED, BAD_TOKEN, UNREGISTERED, ACCEPTED] {
        let request = DispatchRequest::new(endpoint(&server), credentials(), notification(token));
        tickets.push(scheduler.submit(request).await.unwrap());
    }
    scheduler.shutdown().await.unwrap();

    let mut log = ResultLog::new();
    while let Some(event) = completions.recv().await {
        let (ticket, notification, outcome) = event.into_parts();
        let _ = log.append(ticket, notification, outcome);
    }

    assert_eq!(log.len(), 4);
    let order: Vec<_> = log.entries().iter().map(|e| e.ticket).collect();
    assert_eq!(order, tickets);

    assert_matches!(
        &log.entries()[0].outcome,
        DispatchOutcome::Accepted { apns_id } if apns_id.to_string() == "0191b6a4-7c2e-7d3a-9b1e-5f6a7b8c9d0e"
    );
    assert_matches!(
        &log.entries()[1].outcome,
        DispatchOutcome::Rejected { reason, invalidation_timestamp: None, .. } if reason == "BadDeviceToken"
    );
    assert_matches!(
        &log.entries()[2].outcome,
        DispatchOutcome::Rejected { reason, invalidation_timestamp, .. }
            if reason == "Unregistered" && *invalidation_timestamp == DateTime::from_timestamp(1_700_000_000, 0)
    );
    assert!(log.entries()[3].outcome.is_accepted());
    assert_eq!(log.failure_count(), 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
}

#[tokio::test]
async fn failures_do_not_stop_the_worker() {
    let server = gateway().await;
    let factory = Arc::new(ApnsClientFactory::new(Duration::from_secs(5)).plaintext());
    let (scheduler, mut completions) = DispatchScheduler::new(factory, SchedulerConfig::default());

    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let requests = [
        DispatchRequest::new(Endpoint::new("", 443), credentials(), notification(ACCEPTED)),
        DispatchRequest::new(
            Endpoint::new("127.0.0.1", closed_port),
            credentials(),
            notification(ACCEPTED),
        ),
        DispatchRequest::new(endpoint(&server), credentials(), notification(ACCEPTED)),
    ];
    for request in requests {
        let _ = scheduler.submit(request).await.unwrap();
    }
    scheduler.shutdown().await.unwrap();

    let mut outcomes = Vec::new();
    while let Some(event) = completions.recv().await {
        outcomes.push(event.into_parts().2);
    }

    assert_eq!(outcomes.len(), 3);
    assert_matches!(
        &outcomes[0],
        DispatchOutcome::Failed { cause: DispatchError::ClientBuild(ClientBuildError::InvalidEndpoint(_)) }
    );
    assert_matches!(&outcomes[1], DispatchOutcome::Failed { cause: DispatchError::Execution(_) });
    assert!(outcomes[2].is_accepted());
}
