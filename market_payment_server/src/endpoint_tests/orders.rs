use actix_web::{http::StatusCode, test::TestRequest};
use market_payment_engine::db_types::{Order, OrderStatusType, Payment};
use mpg_common::MinorUnits;
use serde_json::json;

use super::helpers::{as_customer, TestContext, CUSTOMER, OTHER_CUSTOMER};

#[actix_web::test]
async fn create_new_order() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let body = json!({"order_id": "1001", "customer_id": CUSTOMER, "total": 25_000});
    let (status, body) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).expect("Invalid order JSON");
    assert_eq!(order.order_id.as_str(), "1001");
    assert_eq!(order.customer_id, CUSTOMER);
    assert_eq!(order.total_price, MinorUnits::from(25_000));
    assert_eq!(order.currency, "GHS");
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn resubmitted_order_is_idempotent() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let original = ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let body = json!({"order_id": "1001", "customer_id": CUSTOMER, "total": 25_000});
    let (status, body) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Invalid order JSON");
    assert_eq!(order, original);
}

#[actix_web::test]
async fn conflicting_order_is_rejected() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;
    let body = json!({"order_id": "1001", "customer_id": CUSTOMER, "total": 1});
    let (status, body) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("already exists"), "{body}");
}

#[actix_web::test]
async fn negative_total_is_rejected() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let body = json!({"order_id": "1001", "customer_id": CUSTOMER, "total": -5});
    let (status, _) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn order_payments_are_private() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    ctx.seed_order("1001", CUSTOMER, 25_000).await;

    let req = as_customer(TestRequest::get().uri("/orders/1001/payments"), CUSTOMER);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let payments: Vec<Payment> = serde_json::from_str(&body).expect("Invalid payments JSON");
    assert!(payments.is_empty());

    let req = as_customer(TestRequest::get().uri("/orders/1001/payments"), OTHER_CUSTOMER);
    let (status, _) = ctx.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx.send(TestRequest::get().uri("/orders/1001/payments")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("X-Requester-Id"), "{body}");
}

#[actix_web::test]
async fn overlong_order_id_is_rejected() {
    let _ = env_logger::try_init().ok();
    let ctx = TestContext::simulated();
    let body = json!({"order_id": "9".repeat(100), "customer_id": CUSTOMER, "total": 25_000});
    let (status, _) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
