//! NDA documents and their status transitions

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::{NdaDocument, NdaStatus, NewNda};
use crate::{Error, Result};

const COLUMNS: &str =
    "id, company_id, recipient_name, recipient_email, status, content, created_at, signed_at";

pub async fn create(pool: &SqlitePool, company_id: Uuid, new: NewNda) -> Result<NdaDocument> {
    new.validate()?;

    let nda = NdaDocument {
        id: Uuid::new_v4(),
        company_id,
        recipient_name: new.recipient_name.trim().to_string(),
        recipient_email: new.recipient_email.trim().to_string(),
        status: if new.send { NdaStatus::Sent } else { NdaStatus::Draft },
        content: new.content,
        created_at: Utc::now(),
        signed_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO nda_documents (id, company_id, recipient_name, recipient_email, status, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(nda.id)
    .bind(nda.company_id)
    .bind(&nda.recipient_name)
    .bind(&nda.recipient_email)
    .bind(nda.status)
    .bind(&nda.content)
    .bind(nda.created_at)
    .execute(pool)
    .await?;

    Ok(nda)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<NdaDocument> {
    sqlx::query_as::<_, NdaDocument>(&format!(
        "SELECT {} FROM nda_documents WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("NDA not found: {}", id)))
}

pub async fn list_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<NdaDocument>> {
    let ndas = sqlx::query_as::<_, NdaDocument>(&format!(
        "SELECT {} FROM nda_documents WHERE company_id = ? ORDER BY created_at",
        COLUMNS
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(ndas)
}

/// Check whether `from -> to` is an allowed transition
///
/// draft|sent → signed, any non-revoked → revoked, draft → sent.
pub fn can_transition(from: NdaStatus, to: NdaStatus) -> bool {
    matches!(
        (from, to),
        (NdaStatus::Draft, NdaStatus::Sent)
            | (NdaStatus::Draft, NdaStatus::Signed)
            | (NdaStatus::Sent, NdaStatus::Signed)
            | (NdaStatus::Draft, NdaStatus::Revoked)
            | (NdaStatus::Sent, NdaStatus::Revoked)
            | (NdaStatus::Signed, NdaStatus::Revoked)
    )
}

/// Move an NDA to a new status
pub async fn transition(pool: &SqlitePool, id: Uuid, to: NdaStatus) -> Result<NdaDocument> {
    let mut nda = get(pool, id).await?;
    if !can_transition(nda.status, to) {
        return Err(Error::Conflict(format!(
            "NDA {} cannot move from {:?} to {:?}",
            id, nda.status, to
        )));
    }

    nda.status = to;
    if to == NdaStatus::Signed {
        nda.signed_at = Some(Utc::now());
    }

    sqlx::query("UPDATE nda_documents SET status = ?, signed_at = ? WHERE id = ?")
        .bind(nda.status)
        .bind(nda.signed_at)
        .bind(nda.id)
        .execute(pool)
        .await?;

    Ok(nda)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(can_transition(NdaStatus::Draft, NdaStatus::Signed));
        assert!(can_transition(NdaStatus::Sent, NdaStatus::Signed));
        assert!(can_transition(NdaStatus::Signed, NdaStatus::Revoked));
        assert!(!can_transition(NdaStatus::Signed, NdaStatus::Signed));
        assert!(!can_transition(NdaStatus::Revoked, NdaStatus::Signed));
        assert!(!can_transition(NdaStatus::Revoked, NdaStatus::Revoked));
    }
}
