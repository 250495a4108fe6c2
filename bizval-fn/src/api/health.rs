//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use bizval_common::{db::AnalysisKind, queue};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Pending messages per queue; omitted when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<BTreeMap<String, i64>>,
}

/// GET /health
///
/// No authentication required.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut depths = BTreeMap::new();
    let mut reachable = true;
    for kind in AnalysisKind::ALL {
        match queue::depth(&state.db, kind.queue_name()).await {
            Ok(depth) => {
                depths.insert(kind.queue_name().to_string(), depth);
            }
            Err(e) => {
                warn!(error = %e, "Queue depth unavailable for health check");
                reachable = false;
                break;
            }
        }
    }

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "bizval-fn".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        queue_depth: reachable.then_some(depths),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
