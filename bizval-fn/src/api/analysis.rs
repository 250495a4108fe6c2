//! Queue functions
//!
//! Each function checks the caller owns the company, then writes the
//! `processing` status row and the queue message in one transaction and
//! answers 202. There is no producer-side retry; the worker owns the job
//! from here.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizval_common::api::QueuedResponse;
use bizval_common::db::{analysis_status, companies, valuations, AnalysisKind, AnalysisStatus};
use bizval_common::dcf::{self, DcfAssumptions};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{json_body, required_uuid, AuthUser};
use crate::{ApiError, ApiResult, AppState};

/// Body of the three queue functions
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub company_id: Option<String>,
    pub valuation_id: Option<String>,
    /// DCF only; the worker asks the model when absent
    pub assumptions: Option<Value>,
}

/// POST /functions/analyze-sales-readiness
pub async fn analyze_sales_readiness(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    enqueue_analysis(&state, &user, AnalysisKind::SalesReadiness, json_body(payload)?).await
}

/// POST /functions/analyze-post-dd-readiness
pub async fn analyze_post_dd_readiness(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    enqueue_analysis(&state, &user, AnalysisKind::PostDdReadiness, json_body(payload)?).await
}

/// POST /functions/queue-dcf-analysis
pub async fn queue_dcf_analysis(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    enqueue_analysis(&state, &user, AnalysisKind::Dcf, json_body(payload)?).await
}

async fn enqueue_analysis(
    state: &AppState,
    user: &AuthUser,
    kind: AnalysisKind,
    request: AnalysisRequest,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    let company_id = required_uuid("companyId", request.company_id.as_deref())?;
    let valuation_id = required_uuid("valuationId", request.valuation_id.as_deref())?;

    // Reject bad assumptions now rather than after a worker round trip
    let assumptions = match (kind, request.assumptions) {
        (AnalysisKind::Dcf, Some(value)) if !value.is_null() => {
            let parsed: DcfAssumptions = serde_json::from_value(value.clone())
                .map_err(|e| ApiError::BadRequest(format!("Invalid assumptions: {}", e)))?;
            dcf::evaluate(&parsed)?;
            Some(value)
        }
        _ => None,
    };

    companies::get_owned(&state.db, company_id, user.id).await?;
    valuations::get_for_company(&state.db, valuation_id, company_id).await?;

    let status = analysis_status::enqueue(
        &state.db,
        kind,
        company_id,
        Some(valuation_id),
        user.id,
        assumptions,
    )
    .await?;

    let queue_message_id = status
        .queue_message_id
        .ok_or_else(|| ApiError::Internal("Enqueued job has no message id".to_string()))?;

    info!(
        status_id = %status.id,
        msg_id = queue_message_id,
        company_id = %company_id,
        user_id = %user.id,
        "{} queued",
        kind.label()
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            success: true,
            message: format!("{} queued", kind.label()),
            queue_message_id,
            status_id: status.id,
            status: status.status,
        }),
    ))
}

/// GET /functions/analysis-status/:id
pub async fn get_analysis_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AnalysisStatus>> {
    let status = analysis_status::get(&state.db, id).await?;
    companies::get_owned(&state.db, status.company_id, user.id).await?;
    Ok(Json(status))
}

/// GET /api/companies/:id/analysis-status
pub async fn list_analysis_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AnalysisStatus>>> {
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(Json(analysis_status::list_for_company(&state.db, company_id).await?))
}
