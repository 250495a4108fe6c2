//! Checkout session function

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use super::{json_body, AuthUser};
use crate::billing::{BillingError, CheckoutRequest, CheckoutSession};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub price_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

fn required<'a>(field: &str, value: &'a Option<String>) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))
}

/// Accept only absolute http(s) URLs with a host
fn check_redirect_url(field: &str, url: &str) -> ApiResult<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| ApiError::BadRequest(format!("{} must be an absolute URL", field)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ApiError::BadRequest(format!(
            "{} must be an http or https URL",
            field
        )));
    }
    Ok(())
}

/// POST /functions/create-checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> ApiResult<Json<CheckoutSession>> {
    let request = json_body(payload)?;
    let price_id = required("priceId", &request.price_id)?;
    let success_url = required("successUrl", &request.success_url)?;
    let cancel_url = required("cancelUrl", &request.cancel_url)?;
    check_redirect_url("successUrl", success_url)?;
    check_redirect_url("cancelUrl", cancel_url)?;

    let provider = state.checkout.as_ref().ok_or(BillingError::NotConfigured)?;

    let session = provider
        .create_session(&CheckoutRequest {
            price_id: price_id.to_string(),
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
            user_id: user.id,
            customer_email: user.email.clone(),
        })
        .await?;

    info!(user_id = %user.id, session_id = %session.session_id, "Checkout created");
    Ok(Json(session))
}
