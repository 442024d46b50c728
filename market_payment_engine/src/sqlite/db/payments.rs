use chrono::Duration;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use super::push_in_list;
use crate::{
    db_types::{NewPayment, OrderId, OrderStatusType, Payment, PaymentStatus},
    state_machine::PaymentTransition,
    traits::PaymentStoreError,
};

/// The order statuses that can take a new payment attempt.
const PAYABLE_ORDER_STATUSES: [OrderStatusType; 2] = [OrderStatusType::Pending, OrderStatusType::PaymentPending];

/// Inserts a `Pending` payment for the order, copying the amount from the order total in the same statement.
///
/// Returns `None` if the order does not exist or is not payable. A live payment for the same order trips the partial
/// unique index, which is reported as [`PaymentStoreError::PaymentInProgress`].
pub async fn insert_reservation(
    payment: &NewPayment,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, PaymentStoreError> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO payments (order_id, amount, method, gateway_provider, payer, status) \
         SELECT order_id, total_price, ",
    );
    builder.push_bind(payment.method);
    builder.push(", ");
    builder.push_bind(payment.gateway_provider);
    builder.push(", ");
    builder.push_bind(payment.payer.as_str());
    builder.push(", ");
    builder.push_bind(PaymentStatus::Pending.to_string());
    builder.push(" FROM orders WHERE order_id = ");
    builder.push_bind(payment.order_id.as_str());
    builder.push(" AND status IN ");
    push_in_list(&mut builder, &PAYABLE_ORDER_STATUSES);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let result = builder.build_query_as::<Payment>().fetch_optional(conn).await;
    match result {
        Ok(payment) => Ok(payment),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Order {} already has a live payment", payment.order_id);
            Err(PaymentStoreError::PaymentInProgress(payment.order_id.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Deletes the payment if it is still `Pending`.
pub async fn delete_reservation(payment_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM payments WHERE id = $1 AND status = $2")
        .bind(payment_id)
        .bind(PaymentStatus::Pending.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE gateway_reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// `Processing` payments whose last update is older than `min_age`.
pub async fn fetch_stale_payments(min_age: Duration, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    let modifier = format!("-{} seconds", min_age.num_seconds().max(0));
    let payments = sqlx::query_as(
        "SELECT * FROM payments WHERE status = $1 AND updated_at <= datetime('now', $2) ORDER BY updated_at ASC",
    )
    .bind(PaymentStatus::Processing.to_string())
    .bind(modifier)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// The conditional half of a transition: moves the payment to the transition target only if its current status is
/// one the transition may start from. Returns the owning order id if the row was updated.
pub(crate) async fn apply_payment_transition(
    payment_id: i64,
    transition: &PaymentTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderId>, sqlx::Error> {
    let at = transition.timestamp();
    let mut builder = QueryBuilder::new("UPDATE payments SET status = ");
    builder.push_bind(transition.target().to_string());
    builder.push(", updated_at = CURRENT_TIMESTAMP");
    match transition {
        PaymentTransition::Activate { reference, .. } => {
            builder.push(", gateway_reference = ");
            builder.push_bind(reference.as_str());
            builder.push(", initiated_at = ");
            builder.push_bind(at);
        },
        PaymentTransition::Succeed { source, .. } => {
            builder.push(", settled_by = ");
            builder.push_bind(*source);
            builder.push(", confirmed_at = ");
            builder.push_bind(at);
        },
        PaymentTransition::Fail { reason, source, .. } => {
            builder.push(", settled_by = ");
            builder.push_bind(*source);
            builder.push(", failure_reason = ");
            builder.push_bind(reason.as_str());
            builder.push(", failed_at = ");
            builder.push_bind(at);
        },
        PaymentTransition::Cancel { .. } => {
            builder.push(", cancelled_at = ");
            builder.push_bind(at);
        },
    }
    builder.push(" WHERE id = ");
    builder.push_bind(payment_id);
    builder.push(" AND status IN ");
    push_in_list(&mut builder, transition.allowed_from());
    builder.push(" RETURNING order_id");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order_id: Option<(OrderId,)> = builder.build_query_as().fetch_optional(conn).await?;
    Ok(order_id.map(|(id,)| id))
}
