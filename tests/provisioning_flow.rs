// End-to-end provisioning through the HTTP router with a scripted process runner,
// real files in a temp dir and a local webhook receiver.
mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{FakeRunner, TestApp, WebhookReceiver, json_body};
use provisio::core::OutcomeStatus;
use tower::ServiceExt;

#[tokio::test(flavor = "multi_thread")]
async fn test_valid_request_activates_domain() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new());
    let body = TestApp::body("shop.example.com", &receiver.url);

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["domain"], "shop.example.com");
    assert!(json["message"].as_str().unwrap().contains("shop.example.com"));

    // Proxy site written and enabled
    let site = std::fs::read_to_string(app.site_path("shop.example.com")).unwrap();
    assert!(site.contains("server_name shop.example.com"));
    assert!(site.contains("proxy_pass http://127.0.0.1:3000"));
    assert!(app.enabled_path("shop.example.com").exists());

    // Certbot "succeeded" without producing files, so the self-signed pair is installed
    // next to the ACME store rather than inside it
    let cert_dir = app.self_signed_dir("shop.example.com");
    let chain = std::fs::read_to_string(cert_dir.join("fullchain.pem")).unwrap();
    assert!(chain.contains("BEGIN CERTIFICATE"));
    assert!(cert_dir.join("privkey.pem").exists());
    assert!(!app.certificate_dir("shop.example.com").exists());
    assert!(site.contains(&cert_dir.join("fullchain.pem").display().to_string()));

    assert_eq!(app.runner.programs(), vec!["nginx", "certbot", "systemctl"]);

    let deliveries = receiver.deliveries();
    assert_eq!(deliveries.len(), 1);
    let outcome = deliveries[0].outcome();
    assert_eq!(outcome.status, OutcomeStatus::Active);
    assert_eq!(outcome.domain, "shop.example.com");
    assert_eq!(outcome.user_id, "user-42");
    assert!(outcome.error.is_none());

    // The callback is signed with the same secret over the exact body
    let signature = deliveries[0].signature.as_deref().unwrap();
    assert!(app.signer.verify(&deliveries[0].body, signature));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reserved_domain_is_rejected_without_side_effects() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new());
    let body = TestApp::body("pholio.link", &receiver.url);

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("pholio.link"));

    assert!(app.runner.calls().is_empty());
    assert!(app.root_is_untouched());
    assert!(receiver.deliveries().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reserved_subdomain_in_any_case_is_rejected() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new());
    let body = TestApp::body("Tenant.PHOLIO.link", &receiver.url);

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.root_is_untouched());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_proxy_config_fails_and_notifies() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new().failing("nginx"));
    let body = TestApp::body("shop.example.com", &receiver.url);

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid proxy config")
    );

    // No certificate attempt and no reload after a failed syntax check
    assert_eq!(app.runner.programs(), vec!["nginx"]);

    // Rolled back
    assert!(!app.site_path("shop.example.com").exists());
    assert!(!app.enabled_path("shop.example.com").exists());

    let deliveries = receiver.deliveries();
    assert_eq!(deliveries.len(), 1);
    let outcome = deliveries[0].outcome();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.error.unwrap().contains("scripted failure"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_signature_is_rejected_before_processing() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new());
    let body = TestApp::body("shop.example.com", &receiver.url);

    let request = Request::builder()
        .method("POST")
        .uri("/api/custom-domains/setup")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "Invalid signature" })
    );
    assert!(app.root_is_untouched());
    assert!(app.runner.calls().is_empty());
    assert!(receiver.deliveries().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_signature_over_different_body_is_rejected() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new());
    let signed = TestApp::body("shop.example.com", &receiver.url);
    let sent = TestApp::body("evil.example.com", &receiver.url);

    let request = Request::builder()
        .method("POST")
        .uri("/api/custom-domains/setup")
        .header("x-signature", app.signer.sign(signed.as_bytes()))
        .body(Body::from(sent))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.root_is_untouched());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reload_failure_keeps_files_and_reports() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new().failing("systemctl"));
    let body = TestApp::body("shop.example.com", &receiver.url);

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(app.site_path("shop.example.com").exists());
    assert_eq!(receiver.deliveries()[0].outcome().status, OutcomeStatus::Failed);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_webhook_does_not_change_response() {
    let app = TestApp::new(FakeRunner::new());
    // Nothing listens on port 9 locally
    let body = TestApp::body("shop.example.com", "http://127.0.0.1:9/hook");

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_every_response_carries_request_id_and_security_headers() {
    let app = TestApp::new(FakeRunner::new());

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    let request_id = headers["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let app = TestApp::new(FakeRunner::new());
    let body = "x".repeat(128 * 1024);

    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.runner.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_issued_certificate_survives_failed_renewal() {
    let receiver = WebhookReceiver::start().await;
    let app = TestApp::new(FakeRunner::new().failing("certbot"));

    let live = app.certificate_dir("shop.example.com");
    let issued = rcgen::generate_simple_self_signed(vec!["shop.example.com".to_string()]).unwrap();
    let chain = issued.cert.pem();
    std::fs::create_dir_all(&live).unwrap();
    std::fs::write(live.join("fullchain.pem"), &chain).unwrap();
    std::fs::write(live.join("privkey.pem"), issued.signing_key.serialize_pem()).unwrap();

    let body = TestApp::body("shop.example.com", &receiver.url);
    let response = app
        .router
        .clone()
        .oneshot(app.signed_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Custom domain shop.example.com is active");

    assert_eq!(std::fs::read_to_string(live.join("fullchain.pem")).unwrap(), chain);
    assert!(!app.self_signed_dir("shop.example.com").exists());
    let site = std::fs::read_to_string(app.site_path("shop.example.com")).unwrap();
    assert!(site.contains(&live.join("fullchain.pem").display().to_string()));
    assert_eq!(receiver.deliveries()[0].outcome().status, OutcomeStatus::Active);
}
