//! Stored advisor conversations

use chrono::Utc;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::{ChatMessage, Conversation};
use crate::{Error, Result};

const COLUMNS: &str = "id, company_id, title, messages, created_at, updated_at";

/// Roles accepted in a conversation transcript
const ROLES: [&str; 3] = ["user", "assistant", "system"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

fn validate_message(message: &ChatMessage) -> Result<()> {
    if !ROLES.contains(&message.role.as_str()) {
        return Err(Error::InvalidInput(format!(
            "Unknown message role '{}'",
            message.role
        )));
    }
    if message.content.trim().is_empty() {
        return Err(Error::InvalidInput("Message content must not be empty".to_string()));
    }
    Ok(())
}

pub async fn create(
    pool: &SqlitePool,
    company_id: Uuid,
    new: NewConversation,
) -> Result<Conversation> {
    for message in &new.messages {
        validate_message(message)?;
    }

    let now = Utc::now();
    let title = if new.title.trim().is_empty() {
        "Untitled conversation".to_string()
    } else {
        new.title.trim().to_string()
    };
    let conversation = Conversation {
        id: Uuid::new_v4(),
        company_id,
        title,
        messages: Json(new.messages),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO conversations (id, company_id, title, messages, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(conversation.id)
    .bind(conversation.company_id)
    .bind(&conversation.title)
    .bind(&conversation.messages)
    .bind(conversation.created_at)
    .bind(conversation.updated_at)
    .execute(pool)
    .await?;

    Ok(conversation)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {} FROM conversations WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Conversation not found: {}", id)))
}

pub async fn list_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<Conversation>> {
    let conversations = sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {} FROM conversations WHERE company_id = ? ORDER BY updated_at DESC",
        COLUMNS
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(conversations)
}

/// Append messages to a conversation transcript
pub async fn append_messages(
    pool: &SqlitePool,
    id: Uuid,
    messages: Vec<ChatMessage>,
) -> Result<Conversation> {
    if messages.is_empty() {
        return Err(Error::InvalidInput("No messages to append".to_string()));
    }
    for message in &messages {
        validate_message(message)?;
    }

    let mut conversation = get(pool, id).await?;
    conversation.messages.0.extend(messages);
    conversation.updated_at = Utc::now();

    sqlx::query("UPDATE conversations SET messages = ?, updated_at = ? WHERE id = ?")
        .bind(&conversation.messages)
        .bind(conversation.updated_at)
        .bind(conversation.id)
        .execute(pool)
        .await?;

    Ok(conversation)
}
