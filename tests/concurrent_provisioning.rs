// Same-domain requests are serialized; distinct domains are not.
mod common;

use std::time::Duration;

use axum::body::Bytes;
use common::{FakeRunner, Invocation, TestApp, WebhookReceiver};

fn overlaps(a: &Invocation, b: &Invocation) -> bool {
    a.started < b.finished && b.started < a.finished
}

async fn send(app: &TestApp, domain: &str, webhook_url: &str) -> bool {
    let body = TestApp::body(domain, webhook_url);
    let signature = app.signer.sign(body.as_bytes());
    let report = app
        .coordinator
        .handle("concurrency", Bytes::from(body), Some(signature))
        .await;
    report.result.is_ok()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_domain_requests_never_interleave() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new().with_delay(Duration::from_millis(50)));

    let (first, second) = tokio::join!(
        send(&app, "shop.example.com", &receiver.url),
        send(&app, "Shop.Example.com", &receiver.url),
    );
    assert!(first && second);

    let calls = app.runner.calls();
    assert_eq!(calls.len(), 6);
    for (i, a) in calls.iter().enumerate() {
        for b in &calls[i + 1..] {
            assert!(
                !overlaps(a, b),
                "{} and {} ran at the same time",
                a.program,
                b.program
            );
        }
    }

    // Each syntax check saw exactly one complete site file
    for check in calls.iter().filter(|call| call.program == "nginx") {
        assert_eq!(check.sites_seen.len(), 1);
        let (_, contents) = &check.sites_seen[0];
        assert!(contents.contains("proxy_pass"));
        assert!(contents.trim_end().ends_with('}'));
    }

    assert_eq!(receiver.deliveries().len(), 2);
    assert!(app.coordinator.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_domains_run_in_parallel() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new().with_delay(Duration::from_millis(200)));

    let (first, second) = tokio::join!(
        send(&app, "one.example.com", &receiver.url),
        send(&app, "two.example.com", &receiver.url),
    );
    assert!(first && second);

    let calls = app.runner.calls();
    let mut crossed = false;
    for (i, a) in calls.iter().enumerate() {
        for b in &calls[i + 1..] {
            crossed |= overlaps(a, b);
        }
    }
    assert!(crossed, "expected commands for different domains to overlap");
}
