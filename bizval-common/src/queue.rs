//! Table-backed message queue
//!
//! Messages live in `queue_messages`. A message is visible when it is not
//! archived and its visibility time (`vt_ms`) has passed. Reading a message
//! leases it: `vt_ms` moves `vt_seconds` into the future and `read_ct` is
//! incremented, all in one UPDATE so concurrent readers never lease the same
//! message. Consumers archive a message once it has been handled; a message
//! that is not archived becomes visible again when its lease runs out.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{Error, Result};

/// A leased queue message
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub msg_id: i64,
    pub queue_name: String,
    pub message: Json<Value>,
    pub enqueued_at_ms: i64,
    pub vt_ms: i64,
    pub read_ct: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn check_queue_name(queue_name: &str) -> Result<()> {
    if queue_name.is_empty()
        || !queue_name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err(Error::InvalidInput(format!("Invalid queue name: '{}'", queue_name)));
    }
    Ok(())
}

/// Send a message, visible immediately. Returns the message id.
///
/// Accepts a pool or an open transaction so callers can pair the send with
/// other writes.
pub async fn send<'e, E>(executor: E, queue_name: &str, message: &Value) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    send_delayed(executor, queue_name, message, 0).await
}

/// Send a message that becomes visible after `delay_seconds`
pub async fn send_delayed<'e, E>(
    executor: E,
    queue_name: &str,
    message: &Value,
    delay_seconds: i64,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    check_queue_name(queue_name)?;
    let now = now_ms();

    let msg_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO queue_messages (queue_name, message, enqueued_at_ms, vt_ms, read_ct)
        VALUES (?, ?, ?, ?, 0)
        RETURNING msg_id
        "#,
    )
    .bind(queue_name)
    .bind(Json(message))
    .bind(now)
    .bind(now.saturating_add(delay_seconds.max(0).saturating_mul(1000)))
    .fetch_one(executor)
    .await?;

    Ok(msg_id)
}

/// Lease up to `qty` visible messages for `vt_seconds`, oldest first
pub async fn read(
    pool: &SqlitePool,
    queue_name: &str,
    vt_seconds: i64,
    qty: i64,
) -> Result<Vec<QueueMessage>> {
    check_queue_name(queue_name)?;
    if qty <= 0 {
        return Ok(Vec::new());
    }
    let now = now_ms();

    let mut messages = sqlx::query_as::<_, QueueMessage>(
        r#"
        UPDATE queue_messages
        SET vt_ms = ?, read_ct = read_ct + 1
        WHERE msg_id IN (
            SELECT msg_id FROM queue_messages
            WHERE queue_name = ? AND archived_at_ms IS NULL AND vt_ms <= ?
            ORDER BY msg_id
            LIMIT ?
        )
        RETURNING msg_id, queue_name, message, enqueued_at_ms, vt_ms, read_ct
        "#,
    )
    .bind(now.saturating_add(vt_seconds.max(0).saturating_mul(1000)))
    .bind(queue_name)
    .bind(now)
    .bind(qty)
    .fetch_all(pool)
    .await?;

    // RETURNING order is unspecified
    messages.sort_by_key(|m| m.msg_id);
    Ok(messages)
}

/// Move the message's visibility time to `vt_seconds` from now
pub async fn set_vt(pool: &SqlitePool, msg_id: i64, vt_seconds: i64) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE queue_messages SET vt_ms = ? WHERE msg_id = ? AND archived_at_ms IS NULL",
    )
    .bind(now_ms().saturating_add(vt_seconds.max(0).saturating_mul(1000)))
    .bind(msg_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Archive a handled message. Returns false if it was unknown or already archived.
pub async fn archive(pool: &SqlitePool, msg_id: i64) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE queue_messages SET archived_at_ms = ? WHERE msg_id = ? AND archived_at_ms IS NULL",
    )
    .bind(now_ms())
    .bind(msg_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Delete a message outright
pub async fn delete(pool: &SqlitePool, msg_id: i64) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM queue_messages WHERE msg_id = ?")
        .bind(msg_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Number of non-archived messages in a queue (leased or not)
pub async fn depth(pool: &SqlitePool, queue_name: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM queue_messages WHERE queue_name = ? AND archived_at_ms IS NULL",
    )
    .bind(queue_name)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
