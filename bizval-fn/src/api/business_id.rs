//! Business ID validation function

use axum::{extract::rejection::JsonRejection, Json};
use bizval_common::is_valid_business_id;
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBusinessIdRequest {
    #[serde(default)]
    pub business_id: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateBusinessIdResponse {
    pub valid: bool,
}

/// POST /functions/validate-business-id
pub async fn validate_business_id(
    payload: Result<Json<ValidateBusinessIdRequest>, JsonRejection>,
) -> ApiResult<Json<ValidateBusinessIdResponse>> {
    let request = json_body(payload)?;
    Ok(Json(ValidateBusinessIdResponse {
        valid: is_valid_business_id(&request.business_id),
    }))
}
