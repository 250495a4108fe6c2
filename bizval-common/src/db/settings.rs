//! Runtime settings stored in the `settings` table

use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

use crate::Result;

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.and_then(|(v,)| v))
}

/// Write a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Read a setting and parse it, falling back to `default` when missing or unparsable
pub async fn get_parsed<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Display,
{
    match get_setting(pool, key).await? {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("Setting '{}' has invalid value '{}', using default {}", key, raw, default);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}
