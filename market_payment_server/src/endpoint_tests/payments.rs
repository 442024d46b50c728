use actix_web::{http::StatusCode, test::TestRequest};
use market_payment_engine::{
    db_types::{GatewayProvider, OrderStatusType, Payment, PaymentOutcome, PaymentStatus},
    gateways::SimulatedProvider,
};
use serde_json::json;

use super::helpers::{as_customer, TestContext, CUSTOMER, OTHER_CUSTOMER};
use crate::data_objects::{JsonResponse, PaymentSessionResponse, PaymentStatusResponse};

async fn start_momo_payment(ctx: &TestContext<SimulatedProvider>, order_id: &str) -> PaymentSessionResponse {
    let body = json!({"order_id": order_id, "payer_handle": "024 123 4567"});
    let req = as_customer(TestRequest::post().uri("/payments/mobile_money/initialize").set_json(&body), CUSTOMER);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_str(&body).expect("Invalid session JSON")
}

#[actix_web::test]
async fn initialize_mobile_money_payment() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    assert_eq!(session.order_id.as_str(), "1001");
    assert_eq!(session.status, PaymentStatus::Processing);
    assert_eq!(session.order_status, OrderStatusType::PaymentPending);
    assert!(session.reference.starts_with("SIM-"));
    assert!(session.instructions.is_some());
    assert!(session.redirect_url.is_none());
}

#[actix_web::test]
async fn initialize_hosted_checkout_payment() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let body = json!({"order_id": "1001", "email": "Alice@Example.com", "callback_url": "https://shop.test/done"});
    let req = as_customer(TestRequest::post().uri("/payments/hosted_checkout/initialize").set_json(&body), CUSTOMER);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let session: PaymentSessionResponse = serde_json::from_str(&body).expect("Invalid session JSON");
    assert!(session.redirect_url.is_some_and(|u| u.ends_with(&session.reference)));
}

#[actix_web::test]
async fn only_one_live_payment_per_order() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    start_momo_payment(&ctx, "1001").await;
    let body = json!({"order_id": "1001", "payer_handle": "0241234567"});
    let req = as_customer(TestRequest::post().uri("/payments/mobile_money/initialize").set_json(&body), CUSTOMER);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("in progress"), "{body}");
}

#[actix_web::test]
async fn invalid_initialize_requests() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    ctx.seed_order("1002", OTHER_CUSTOMER, 25_000).await;
    ctx.seed_order("1003", CUSTOMER, 0).await;

    let momo = "/payments/mobile_money/initialize";
    let checkout = "/payments/hosted_checkout/initialize";
    let paypal = "/payments/paypal/initialize";
    let cases = [
        (paypal, json!({"order_id": "1001", "payer_handle": "0241234567"}), StatusCode::BAD_REQUEST),
        (momo, json!({"order_id": "1001"}), StatusCode::BAD_REQUEST),
        (momo, json!({"order_id": "1001", "payer_handle": "12345"}), StatusCode::BAD_REQUEST),
        (checkout, json!({"order_id": "1001", "email": "nope"}), StatusCode::BAD_REQUEST),
        (momo, json!({"order_id": "1002", "payer_handle": "0241234567"}), StatusCode::NOT_FOUND),
        (momo, json!({"order_id": "9999", "payer_handle": "0241234567"}), StatusCode::NOT_FOUND),
        // Zero-value orders can be recorded, but not paid for
        (momo, json!({"order_id": "1003", "payer_handle": "0241234567"}), StatusCode::BAD_REQUEST),
    ];
    for (path, body, expected) in cases {
        let req = as_customer(TestRequest::post().uri(path).set_json(&body), CUSTOMER);
        let (status, body) = ctx.send(req).await;
        assert_eq!(status, expected, "{path}: {body}");
    }
    // Nothing was reserved by any of the failed attempts
    let req = as_customer(TestRequest::get().uri("/orders/1001/payments"), CUSTOMER);
    let (_, body) = ctx.send(req).await;
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn verify_settled_payment() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    let uri = format!("/payments/mobile_money/verify/{}", session.reference);

    let (status, body) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    let result: PaymentStatusResponse = serde_json::from_str(&body).expect("Invalid status JSON");
    assert_eq!(result.status, PaymentStatus::Processing);

    ctx.settle(GatewayProvider::MobileMoney, &session.reference, PaymentOutcome::Success).await;
    let (status, body) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    let result: PaymentStatusResponse = serde_json::from_str(&body).expect("Invalid status JSON");
    assert_eq!(result.status, PaymentStatus::Success);
    assert_eq!(result.order_status, OrderStatusType::Confirmed);
    assert_eq!(result.reference.as_deref(), Some(session.reference.as_str()));

    // Only the owner may poll, and only with the right provider
    let (status, _) = ctx.send(as_customer(TestRequest::get().uri(&uri), OTHER_CUSTOMER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let uri = format!("/payments/hosted_checkout/verify/{}", session.reference);
    let (status, _) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn verify_failed_payment() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    let outcome = PaymentOutcome::Failed("Insufficient balance".into());
    ctx.settle(GatewayProvider::MobileMoney, &session.reference, outcome).await;
    let uri = format!("/payments/mobile_money/verify/{}", session.reference);
    let (status, body) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    let result: PaymentStatusResponse = serde_json::from_str(&body).expect("Invalid status JSON");
    assert_eq!(result.status, PaymentStatus::Failed);
    assert_eq!(result.order_status, OrderStatusType::Failed);
    assert_eq!(result.failure_reason.as_deref(), Some("Insufficient balance"));
}

#[actix_web::test]
async fn callback_is_requeried() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    ctx.settle(GatewayProvider::MobileMoney, &session.reference, PaymentOutcome::Success).await;

    // The callback body claims nothing about the outcome. It is read back from the provider.
    let body = json!({"referenceId": session.reference, "status": "FAILED"});
    let req = TestRequest::post().uri("/payments/mobile_money/callback").set_json(&body);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let result: PaymentStatusResponse = serde_json::from_str(&body).expect("Invalid status JSON");
    assert_eq!(result.status, PaymentStatus::Success);

    let req = TestRequest::post().uri("/payments/mobile_money/callback").set_json(json!({"referenceId": "SIM-NOPE"}));
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let ack: JsonResponse = serde_json::from_str(&body).expect("Invalid JSON");
    assert!(!ack.success);
}

#[actix_web::test]
async fn cancel_then_retry() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    let uri = format!("/payments/{}/cancel", session.payment_id);

    let (status, _) = ctx.send(as_customer(TestRequest::post().uri(&uri), OTHER_CUSTOMER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx.send(as_customer(TestRequest::post().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: PaymentStatusResponse = serde_json::from_str(&body).expect("Invalid status JSON");
    assert_eq!(result.status, PaymentStatus::Cancelled);
    assert_eq!(result.order_status, OrderStatusType::Pending);

    let (status, _) = ctx.send(as_customer(TestRequest::post().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let retry = start_momo_payment(&ctx, "1001").await;
    assert_ne!(retry.payment_id, session.payment_id);
    let req = as_customer(TestRequest::get().uri("/orders/1001/payments"), CUSTOMER);
    let (_, body) = ctx.send(req).await;
    let payments: Vec<Payment> = serde_json::from_str(&body).expect("Invalid payments JSON");
    assert_eq!(payments.len(), 2);
}

#[actix_web::test]
async fn cannot_cancel_settled_payment() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    // Settled at the provider, but nobody has told us yet
    ctx.settle(GatewayProvider::MobileMoney, &session.reference, PaymentOutcome::Success).await;
    let uri = format!("/payments/{}/cancel", session.payment_id);
    let (status, body) = ctx.send(as_customer(TestRequest::post().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let uri = format!("/payments/{}", session.payment_id);
    let (status, body) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    let payment: Payment = serde_json::from_str(&body).expect("Invalid payment JSON");
    assert_eq!(payment.status, PaymentStatus::Success);
}

#[actix_web::test]
async fn fetch_payment_by_id() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let session = start_momo_payment(&ctx, "1001").await;
    let uri = format!("/payments/{}", session.payment_id);
    let (status, body) = ctx.send(as_customer(TestRequest::get().uri(&uri), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    let payment: Payment = serde_json::from_str(&body).expect("Invalid payment JSON");
    assert_eq!(payment.gateway_reference.as_deref(), Some(session.reference.as_str()));
    assert_eq!(payment.gateway_provider, GatewayProvider::MobileMoney);

    let (status, _) = ctx.send(as_customer(TestRequest::get().uri(&uri), OTHER_CUSTOMER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send(as_customer(TestRequest::get().uri("/payments/999"), CUSTOMER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
