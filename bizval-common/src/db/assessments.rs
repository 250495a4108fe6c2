//! Readiness assessments produced by the worker

use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::models::{AnalysisKind, Assessment};
use crate::Result;

pub async fn create<'e, E>(
    executor: E,
    company_id: Uuid,
    valuation_id: Option<Uuid>,
    kind: AnalysisKind,
    score: i64,
    summary: &str,
    details: Value,
) -> Result<Assessment>
where
    E: Executor<'e, Database = Sqlite>,
{
    let assessment = Assessment {
        id: Uuid::new_v4(),
        company_id,
        valuation_id,
        kind,
        score: score.clamp(0, 100),
        summary: summary.to_string(),
        details: Json(details),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO assessments (id, company_id, valuation_id, kind, score, summary, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(assessment.id)
    .bind(assessment.company_id)
    .bind(assessment.valuation_id)
    .bind(assessment.kind)
    .bind(assessment.score)
    .bind(&assessment.summary)
    .bind(&assessment.details)
    .bind(assessment.created_at)
    .execute(executor)
    .await?;

    Ok(assessment)
}

pub async fn list_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<Assessment>> {
    let assessments = sqlx::query_as::<_, Assessment>(
        r#"
        SELECT id, company_id, valuation_id, kind, score, summary, details, created_at
        FROM assessments WHERE company_id = ? ORDER BY created_at DESC
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(assessments)
}
