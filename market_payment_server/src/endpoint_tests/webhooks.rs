use std::net::IpAddr;

use actix_web::{http::StatusCode, test::TestRequest};
use market_payment_engine::{
    db_types::{OrderStatusType, PaymentStatus},
    gateways::SimulatedProvider,
    helpers::{WebhookVerifier, CHECKOUT_SIGNATURE_HEADER},
};
use mpg_common::Secret;
use serde_json::json;

use super::helpers::{as_customer, TestContext, CUSTOMER, WEBHOOK_SECRET};
use crate::{
    config::ServerOptions,
    data_objects::{JsonResponse, PaymentSessionResponse, PaymentStatusResponse},
};

const WEBHOOK_PATH: &str = "/payments/hosted_checkout/webhook";

async fn start_checkout_payment(ctx: &TestContext<SimulatedProvider>) -> PaymentSessionResponse {
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let body = json!({"order_id": "1001", "email": "alice@example.com"});
    let req = as_customer(TestRequest::post().uri("/payments/hosted_checkout/initialize").set_json(&body), CUSTOMER);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_str(&body).expect("Invalid session JSON")
}

fn sign(payload: &str) -> String {
    WebhookVerifier::new(Secret::new(WEBHOOK_SECRET.to_string())).sign(payload.as_bytes()).expect("Could not sign")
}

fn webhook(payload: &str, signature: Option<String>) -> TestRequest {
    let mut req = TestRequest::post()
        .uri(WEBHOOK_PATH)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload.to_string());
    if let Some(signature) = signature {
        req = req.insert_header((CHECKOUT_SIGNATURE_HEADER, signature));
    }
    req
}

async fn payment_status(ctx: &TestContext<SimulatedProvider>, reference: &str) -> PaymentStatusResponse {
    let uri = format!("/payments/hosted_checkout/verify/{reference}");
    let (status, body) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_str(&body).expect("Invalid status JSON")
}

#[actix_web::test]
async fn signed_success_webhook() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let session = start_checkout_payment(&ctx).await;
    let payload = json!({"event": "charge.success", "data": {"reference": session.reference}}).to_string();

    let (status, body) = ctx.send(webhook(&payload, Some(sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ack: JsonResponse = serde_json::from_str(&body).expect("Invalid JSON");
    assert!(ack.success);

    let result = payment_status(&ctx, &session.reference).await;
    assert_eq!(result.status, PaymentStatus::Success);
    assert_eq!(result.order_status, OrderStatusType::Confirmed);

    // Providers redeliver. A replay is acknowledged and changes nothing.
    let (status, _) = ctx.send(webhook(&payload, Some(sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn late_failure_does_not_undo_success() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let session = start_checkout_payment(&ctx).await;
    let success = json!({"event": "charge.success", "data": {"reference": session.reference}}).to_string();
    let failure = json!({
        "event": "charge.failed",
        "data": {"reference": session.reference, "gateway_response": "Declined"}
    })
    .to_string();
    ctx.send(webhook(&success, Some(sign(&success)))).await;
    let (status, _) = ctx.send(webhook(&failure, Some(sign(&failure)))).await;
    assert_eq!(status, StatusCode::OK);
    let result = payment_status(&ctx, &session.reference).await;
    assert_eq!(result.status, PaymentStatus::Success);
    assert!(result.failure_reason.is_none());
}

#[actix_web::test]
async fn bad_signatures_are_refused() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let session = start_checkout_payment(&ctx).await;
    let payload = json!({"event": "charge.success", "data": {"reference": session.reference}}).to_string();
    let tampered = payload.replace("success", "failed");

    let requests = [
        webhook(&payload, None),
        webhook(&payload, Some("zz-not-hex".into())),
        webhook(&tampered, Some(sign(&payload))),
    ];
    for req in requests {
        let (status, body) = ctx.send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.is_empty(), "{body}");
    }
    let result = payment_status(&ctx, &session.reference).await;
    assert_eq!(result.status, PaymentStatus::Processing);
}

#[actix_web::test]
async fn unknown_references_and_events_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    start_checkout_payment(&ctx).await;

    let payload = json!({"event": "charge.success", "data": {"reference": "SIM-0000000000000000"}}).to_string();
    let (status, body) = ctx.send(webhook(&payload, Some(sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
    let ack: JsonResponse = serde_json::from_str(&body).expect("Invalid JSON");
    assert!(!ack.success);

    let payload = json!({"event": "transfer.success", "data": {"reference": "TRF-1"}}).to_string();
    let (status, body) = ctx.send(webhook(&payload, Some(sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
    let ack: JsonResponse = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(ack.message, "Event ignored");
}

#[actix_web::test]
async fn malformed_webhook_body() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let payload = "{\"event\": ";
    let (status, _) = ctx.send(webhook(payload, Some(sign(payload)))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn provider_without_webhooks() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let payload = json!({"event": "charge.success", "data": {"reference": "SIM-1"}}).to_string();
    let req = TestRequest::post()
        .uri("/payments/mobile_money/webhook")
        .insert_header((CHECKOUT_SIGNATURE_HEADER, sign(&payload)))
        .set_payload(payload);
    let (status, _) = ctx.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn whitelisted_providers_only() {
    let _ = env_logger::try_init().ok();
    let whitelist = vec!["10.0.0.1".parse::<IpAddr>().unwrap()];
    let options = ServerOptions { webhook_whitelist: Some(whitelist), ..Default::default() };
    let ctx = TestContext::simulated().with_options(options);
    let session = start_checkout_payment(&ctx).await;
    let payload = json!({"event": "charge.success", "data": {"reference": session.reference}}).to_string();

    let req = webhook(&payload, Some(sign(&payload))).peer_addr("192.168.1.20:443".parse().unwrap());
    let (status, _) = ctx.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = TestRequest::post()
        .uri("/payments/hosted_checkout/callback")
        .peer_addr("192.168.1.20:443".parse().unwrap())
        .set_json(json!({"reference": session.reference}));
    let (status, _) = ctx.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payment_status(&ctx, &session.reference).await.status, PaymentStatus::Processing);

    let req = webhook(&payload, Some(sign(&payload))).peer_addr("10.0.0.1:443".parse().unwrap());
    let (status, _) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment_status(&ctx, &session.reference).await.status, PaymentStatus::Success);
}
