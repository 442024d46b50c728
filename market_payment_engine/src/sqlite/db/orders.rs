use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use super::push_in_list;
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    state_machine::OrderEffect,
    traits::PaymentStoreError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
///
/// An existing order with the same id but different details is an error. The insert is attempted first, so the
/// writer lock is held before the existing row is read.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentStoreError> {
    if let Some(inserted) = insert_order(&order, conn).await? {
        debug!("🗃️ Order [{}] inserted with id {}", inserted.order_id, inserted.id);
        return Ok((inserted, true));
    }
    let existing = fetch_order_by_order_id(&order.order_id, conn)
        .await?
        .ok_or_else(|| PaymentStoreError::OrderNotFound(order.order_id.clone()))?;
    if order.is_equivalent(&existing) {
        Ok((existing, false))
    } else {
        Err(PaymentStoreError::OrderConflict(existing.order_id))
    }
}

/// Inserts a new order into the database using the given connection. Returns `None` if an order with the same id
/// exists. This is not atomic. You can embed this call inside a transaction if you need to ensure atomicity, and pass
/// `&mut *tx` as the connection argument.
async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, PaymentStoreError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, customer_id, total_price, currency)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.customer_id.as_str())
    .bind(order.total_price.value())
    .bind(order.currency.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Moves the order to `effect.to` if it is currently in one of `effect.from`. Returns the number of rows changed.
pub(crate) async fn apply_order_effect(
    order_id: &OrderId,
    effect: &OrderEffect,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(effect.to.to_string());
    builder.push(", updated_at = CURRENT_TIMESTAMP");
    if effect.to == OrderStatusType::Confirmed {
        builder.push(", confirmed_at = CURRENT_TIMESTAMP");
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status IN ");
    push_in_list(&mut builder, effect.from);
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
