//! Analysis job tracking rows
//!
//! A row is created as `processing` in the same transaction that sends the
//! queue message, so a message never exists without its row. The worker moves
//! it to `completed` or `failed`.

use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::models::{AnalysisJob, AnalysisKind, AnalysisStatus, JobStatus};
use crate::{queue, Error, Result};

const COLUMNS: &str = "id, kind, company_id, valuation_id, requested_by, status, \
     queue_message_id, result, error, created_at, updated_at";

/// Create the tracking row and send the queue message atomically
///
/// Returns the row with its `queue_message_id` filled in.
pub async fn enqueue(
    pool: &SqlitePool,
    kind: AnalysisKind,
    company_id: Uuid,
    valuation_id: Option<Uuid>,
    requested_by: Uuid,
    assumptions: Option<Value>,
) -> Result<AnalysisStatus> {
    let now = Utc::now();
    let mut status = AnalysisStatus {
        id: Uuid::new_v4(),
        kind,
        company_id,
        valuation_id,
        requested_by,
        status: JobStatus::Processing,
        queue_message_id: None,
        result: None,
        error: None,
        created_at: now,
        updated_at: now,
    };

    let job = AnalysisJob {
        status_id: status.id,
        kind,
        company_id,
        valuation_id,
        requested_by,
        assumptions,
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO analysis_status (id, kind, company_id, valuation_id, requested_by, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(status.id)
    .bind(status.kind)
    .bind(status.company_id)
    .bind(status.valuation_id)
    .bind(status.requested_by)
    .bind(status.status)
    .bind(status.created_at)
    .bind(status.updated_at)
    .execute(&mut *tx)
    .await?;

    let msg_id = queue::send(&mut *tx, kind.queue_name(), &serde_json::to_value(&job)?).await?;

    sqlx::query("UPDATE analysis_status SET queue_message_id = ? WHERE id = ?")
        .bind(msg_id)
        .bind(status.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    status.queue_message_id = Some(msg_id);
    info!(
        status_id = %status.id,
        msg_id = msg_id,
        company_id = %company_id,
        queue = kind.queue_name(),
        "Analysis job enqueued"
    );
    Ok(status)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<AnalysisStatus> {
    sqlx::query_as::<_, AnalysisStatus>(&format!(
        "SELECT {} FROM analysis_status WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Analysis status not found: {}", id)))
}

pub async fn list_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<AnalysisStatus>> {
    let rows = sqlx::query_as::<_, AnalysisStatus>(&format!(
        "SELECT {} FROM analysis_status WHERE company_id = ? ORDER BY created_at DESC",
        COLUMNS
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mark a job completed with its result
///
/// Takes a transaction so the job's own writes commit together with the status.
pub async fn mark_completed<'e, E>(executor: E, id: Uuid, result: Value) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE analysis_status SET status = ?, result = ?, error = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(JobStatus::Completed)
    .bind(Json(result))
    .bind(Utc::now())
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Mark a job permanently failed
pub async fn mark_failed(pool: &SqlitePool, id: Uuid, error: &str) -> Result<()> {
    sqlx::query("UPDATE analysis_status SET status = ?, error = ?, updated_at = ? WHERE id = ?")
        .bind(JobStatus::Failed)
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a transient error while the job stays `processing`
pub async fn record_attempt_error(pool: &SqlitePool, id: Uuid, error: &str) -> Result<()> {
    sqlx::query("UPDATE analysis_status SET error = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .bind(JobStatus::Processing)
        .execute(pool)
        .await?;
    Ok(())
}
