use std::{str::FromStr, time::Duration};

use cucumber::{gherkin::Step, then, when};
use futures_util::future::join_all;
use market_payment_engine::{
    db_types::{GatewayProvider, NewOrder, OrderId, OrderStatusType, OutcomeSource, PaymentOutcome, PaymentStatus},
    helpers::WebhookVerifier,
    payment_objects::{InitiatePaymentRequest, PaymentKey, ReconcileResult},
    traits::PayerDetails,
    PaymentFlowError,
    PaymentStore,
};
use mpg_common::{MinorUnits, Secret};

use crate::cucumber::{payment_world::WEBHOOK_SECRET, PaymentWorld};

fn error_kind(e: &PaymentFlowError) -> &'static str {
    match e {
        PaymentFlowError::Validation(_) => "invalid request",
        PaymentFlowError::PaymentInProgress(_) => "payment in progress",
        PaymentFlowError::OrderNotFound(_) => "order not found",
        PaymentFlowError::PaymentNotFound(_) => "payment not found",
        PaymentFlowError::InvalidOrder { .. } => "invalid order",
        PaymentFlowError::OrderConflict(_) => "order conflict",
        PaymentFlowError::NotAllowed(_) => "not allowed",
        PaymentFlowError::UnsupportedProvider(_) => "unsupported provider",
        PaymentFlowError::Gateway(_) => "gateway error",
        PaymentFlowError::InvalidSignature => "invalid signature",
        PaymentFlowError::Database(_) => "database error",
    }
}

fn parse_source(source: &str) -> OutcomeSource {
    match source {
        "poll" => OutcomeSource::Poll,
        "webhook" => OutcomeSource::Webhook,
        "callback" => OutcomeSource::Callback,
        "background" => OutcomeSource::Background,
        s => panic!("Unknown outcome source {s}"),
    }
}

fn parse_outcome(outcome: &str) -> PaymentOutcome {
    match outcome {
        "success" => PaymentOutcome::Success,
        "pending" => PaymentOutcome::Pending,
        reason => PaymentOutcome::Failed(reason.to_string()),
    }
}

#[when(expr = "order {word} is placed by customer '{word}' for {int} GHS")]
async fn place_order(world: &mut PaymentWorld, order_id: String, customer_id: String, price: i64) {
    let order = NewOrder::new(OrderId::from(order_id), customer_id, MinorUnits::from_major(price));
    world.system().orders.create_order(order).await.expect("Error creating order");
}

#[when(expr = "the following orders are placed")]
async fn place_orders(world: &mut PaymentWorld, step: &Step) {
    let table = step.table.as_ref().expect("Missing order table");
    for row in table.rows.iter().skip(1) {
        let price = row[2].parse::<i64>().expect("Invalid price");
        let order = NewOrder::new(OrderId::from(row[0].as_str()), row[1].clone(), MinorUnits::from_major(price));
        world.system().orders.create_order(order).await.expect("Error creating order");
    }
}

async fn initiate(
    world: &mut PaymentWorld,
    customer: String,
    order_id: String,
    provider: GatewayProvider,
    payer: PayerDetails,
) {
    let request = InitiatePaymentRequest::new(OrderId::from(order_id), customer, provider, payer);
    match world.api().initiate_payment(request).await {
        Ok(session) => {
            world.last_error = None;
            world.record(Ok(ReconcileResult::applied(session.payment, session.order)));
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "'{word}' pays for order {word} by mobile money from {string}")]
async fn pay_by_phone(world: &mut PaymentWorld, customer: String, order_id: String, phone: String) {
    initiate(world, customer, order_id, GatewayProvider::MobileMoney, PayerDetails::Phone(phone)).await;
}

#[when(expr = "'{word}' pays for order {word} by card as {string}")]
async fn pay_by_card(world: &mut PaymentWorld, customer: String, order_id: String, email: String) {
    initiate(world, customer, order_id, GatewayProvider::HostedCheckout, PayerDetails::Email(email)).await;
}

#[then(expr = "the payment request is rejected with {string}")]
async fn payment_request_rejected(world: &mut PaymentWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last request did not fail");
    assert_eq!(error_kind(err), kind, "Unexpected error: {err}");
}

#[then(expr = "the payment request succeeds")]
async fn payment_request_succeeds(world: &mut PaymentWorld) {
    assert!(world.last_error.is_none(), "The last request failed: {:?}", world.last_error);
}

#[when(expr = "the provider settles the latest payment for order {word} with {string}")]
async fn provider_settles(world: &mut PaymentWorld, order_id: String, outcome: String) {
    let payment = world.latest_payment(&order_id).await;
    let reference = payment.gateway_reference.expect("Payment has no reference");
    let settled = world.provider(payment.gateway_provider).settle_now(&reference, parse_outcome(&outcome)).await;
    assert!(settled, "The provider had already settled {reference}");
}

#[when(expr = "'{word}' verifies the latest payment for order {word}")]
async fn verify_payment(world: &mut PaymentWorld, customer: String, order_id: String) {
    let payment = world.latest_payment(&order_id).await;
    let reference = payment.gateway_reference.expect("Payment has no reference");
    let result = world.api().verify_payment(payment.gateway_provider, &reference, &customer).await;
    world.record(result);
}

#[when(expr = "a {word} reports {string} for the latest payment on order {word}")]
async fn outcome_reported(world: &mut PaymentWorld, source: String, outcome: String, order_id: String) {
    let payment = world.latest_payment(&order_id).await;
    let key = PaymentKey::Id(payment.id);
    let result = world.api().reconcile(key, parse_outcome(&outcome), parse_source(&source)).await;
    world.record(result);
}

#[when(expr = "every source reports {string} at once for the latest payment on order {word}")]
async fn concurrent_outcomes(world: &mut PaymentWorld, outcome: String, order_id: String) {
    let payment = world.latest_payment(&order_id).await;
    let outcome = parse_outcome(&outcome);
    let sources = [OutcomeSource::Poll, OutcomeSource::Webhook, OutcomeSource::Callback, OutcomeSource::Background];
    let api = world.api();
    let calls = sources.iter().map(|s| api.reconcile(PaymentKey::Id(payment.id), outcome.clone(), *s));
    let results = join_all(calls).await;
    let winners = results.iter().filter(|r| r.as_ref().map(|r| r.transitioned).unwrap_or(false)).count();
    assert_eq!(winners, 1, "Expected a single winner, but got {winners}");
}

#[when(expr = "'{word}' cancels the latest payment for order {word}")]
async fn cancel_payment(world: &mut PaymentWorld, customer: String, order_id: String) {
    let payment = world.latest_payment(&order_id).await;
    let result = world.api().cancel_payment(payment.id, &customer).await;
    world.record(result);
}

#[when(expr = "the checkout provider sends a {word} webhook for the latest payment on order {word}")]
async fn signed_webhook(world: &mut PaymentWorld, event: String, order_id: String) {
    let payment = world.latest_payment(&order_id).await;
    let body = webhook_body(&event, payment.gateway_reference.as_deref().unwrap_or_default());
    let signature = WebhookVerifier::new(Secret::new(WEBHOOK_SECRET.to_string()))
        .sign(body.as_bytes())
        .expect("Error signing webhook");
    let result =
        world.api().process_signed_webhook(GatewayProvider::HostedCheckout, body.as_bytes(), Some(&signature)).await;
    world.record(result.map(|r| r.expect("The webhook carried no outcome")));
}

#[when(expr = "a forged {word} webhook arrives for the latest payment on order {word}")]
async fn forged_webhook(world: &mut PaymentWorld, event: String, order_id: String) {
    let payment = world.latest_payment(&order_id).await;
    let body = webhook_body(&event, payment.gateway_reference.as_deref().unwrap_or_default());
    let signature = WebhookVerifier::new(Secret::new("not-the-secret".to_string()))
        .sign(body.as_bytes())
        .expect("Error signing webhook");
    let result =
        world.api().process_signed_webhook(GatewayProvider::HostedCheckout, body.as_bytes(), Some(&signature)).await;
    world.record(result.map(|r| r.expect("The webhook carried no outcome")));
}

fn webhook_body(event: &str, reference: &str) -> String {
    format!(r#"{{"event":"{event}","data":{{"reference":"{reference}","gateway_response":"Declined by issuer"}}}}"#)
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut PaymentWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "the last step changed the payment")]
async fn last_step_changed(world: &mut PaymentWorld) {
    let result = world.last_result.as_ref().expect("No step result recorded");
    let result = result.as_ref().expect("The last step failed");
    assert!(result.transitioned, "The payment did not change");
}

#[then(expr = "the last step did not change the payment")]
async fn last_step_unchanged(world: &mut PaymentWorld) {
    let result = world.last_result.as_ref().expect("No step result recorded");
    let result = result.as_ref().expect("The last step failed");
    assert!(!result.transitioned, "The payment changed");
}

#[then(expr = "the last step failed with {string}")]
async fn last_step_failed(world: &mut PaymentWorld, kind: String) {
    let result = world.last_result.as_ref().expect("No step result recorded");
    let err = result.as_ref().expect_err("The last step succeeded");
    assert_eq!(error_kind(err), kind, "Unexpected error: {err}");
}

#[then(expr = "the latest payment for order {word} is {word}")]
async fn payment_status(world: &mut PaymentWorld, order_id: String, status: String) {
    let payment = world.latest_payment(&order_id).await;
    let expected = PaymentStatus::from_str(&status).expect("Invalid payment status");
    assert_eq!(payment.status, expected, "Payment status is incorrect");
}

#[then(expr = "the latest payment for order {word} failed because {string}")]
async fn payment_failure_reason(world: &mut PaymentWorld, order_id: String, reason: String) {
    let payment = world.latest_payment(&order_id).await;
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some(reason.as_str()), "Failure reason is incorrect");
}

#[then(expr = "the latest payment for order {word} was settled by {word}")]
async fn payment_settled_by(world: &mut PaymentWorld, order_id: String, source: String) {
    let payment = world.latest_payment(&order_id).await;
    assert_eq!(payment.settled_by, Some(parse_source(&source)), "Settlement source is incorrect");
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut PaymentWorld, order_id: String, status: String) {
    let order = world
        .system()
        .orders
        .fetch_order(&OrderId::from(order_id))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    let expected = OrderStatusType::from_str(&status).expect("Invalid order status");
    assert_eq!(order.status, expected, "Order status is incorrect");
}

#[then(expr = "order {word} has {int} payment(s)")]
async fn payment_count(world: &mut PaymentWorld, order_id: String, count: usize) {
    let payments = world
        .system()
        .orders
        .db()
        .fetch_payments_for_order(&OrderId::from(order_id))
        .await
        .expect("Error fetching payments");
    assert_eq!(payments.len(), count, "Payment count is incorrect");
}
