//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when atomicity is needed, and call
//! through to the functions without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, QueryBuilder, Sqlite, SqlitePool};

pub mod orders;
pub mod payments;

const SQLITE_DB_URL: &str = "sqlite://data/market_payments.db";

pub fn db_url() -> String {
    let result = env::var("MPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ MPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Appends `(?, ?, ...)` with one bound parameter per item.
pub(crate) fn push_in_list<T: ToString>(builder: &mut QueryBuilder<'_, Sqlite>, items: &[T]) {
    builder.push("(");
    let mut list = builder.separated(", ");
    for item in items {
        list.push_bind(item.to_string());
    }
    builder.push(")");
}
