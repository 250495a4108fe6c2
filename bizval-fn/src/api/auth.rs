//! Bearer token authentication middleware
//!
//! Applied to every route except `/health` and `validate-business-id`.
//! On success the caller is attached to the request as an [`AuthUser`]
//! extension.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use bizval_common::api::{parse_bearer, AuthError};
use bizval_common::db::users;
use tracing::debug;
use uuid::Uuid;

use crate::{ApiError, AppState};

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::WrongScheme))
        .transpose()?;
    let token = parse_bearer(header)?.to_string();

    let user = users::find_by_token(&state.db, &token)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    debug!(user_id = %user.id, path = %request.uri().path(), "Authenticated request");

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
    });
    Ok(next.run(request).await)
}
