//! User accounts and API tokens

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::User;
use crate::api::auth::{generate_token, hash_token};
use crate::{Error, Result};

/// Find a user by email
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Find the user owning a bearer token
pub async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, created_at FROM users WHERE token_hash = ?",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Create the user if needed and issue a fresh API token
///
/// Any previous token of the user stops working. The plain token is returned
/// once and only its hash is stored.
pub async fn issue_token(pool: &SqlitePool, email: &str) -> Result<(User, String)> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidInput(format!("Invalid email: '{}'", email)));
    }

    let token = generate_token();
    let token_hash = hash_token(&token);

    let user = match find_by_email(pool, email).await? {
        Some(user) => {
            sqlx::query("UPDATE users SET token_hash = ? WHERE id = ?")
                .bind(&token_hash)
                .bind(user.id)
                .execute(pool)
                .await?;
            user
        }
        None => {
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                created_at: Utc::now(),
            };
            sqlx::query("INSERT INTO users (id, email, token_hash, created_at) VALUES (?, ?, ?, ?)")
                .bind(user.id)
                .bind(&user.email)
                .bind(&token_hash)
                .bind(user.created_at)
                .execute(pool)
                .await?;
            user
        }
    };

    Ok((user, token))
}
