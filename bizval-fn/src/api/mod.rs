//! HTTP API handlers for bizval-fn

pub mod analysis;
pub mod auth;
pub mod business_id;
pub mod checkout;
pub mod health;
pub mod records;
pub mod simulate;

pub use analysis::{
    analyze_post_dd_readiness, analyze_sales_readiness, get_analysis_status,
    list_analysis_status, queue_dcf_analysis,
};
pub use auth::{auth_middleware, AuthUser};
pub use business_id::validate_business_id;
pub use checkout::create_checkout;
pub use health::health_routes;
pub use records::{
    append_conversation_messages, create_company, create_conversation, create_nda, create_task,
    create_valuation, delete_company, delete_task, get_company, list_assessments, list_companies,
    list_conversations, list_ndas, list_tasks, list_valuations, revoke_nda, send_nda, sign_nda,
    update_company, update_task,
};
pub use simulate::simulate_valuation;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::ApiError;

/// Unwrap a JSON body, turning extractor rejections into 400s
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(ApiError::from)
}

/// Parse a required UUID field from a request body
pub(crate) fn required_uuid(field: &str, value: Option<&str>) -> Result<Uuid, ApiError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))?;
    Uuid::parse_str(value)
        .map_err(|_| ApiError::BadRequest(format!("{} is not a valid id: {}", field, value)))
}
