//! bizval-fn library - HTTP function server
//!
//! Exposes the queue functions, the synchronous calculators, checkout and
//! record CRUD over one axum router. Handlers validate input, check
//! ownership, then compute or enqueue.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod billing;
pub mod error;

pub use error::{ApiError, ApiResult};

use billing::CheckoutProvider;

/// Default request body limit when the setting is absent
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Checkout provider; `None` when no billing key is configured
    pub checkout: Option<Arc<dyn CheckoutProvider>>,
    /// Server start time, reported by /health
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: SqlitePool, checkout: Option<Arc<dyn CheckoutProvider>>) -> Self {
        Self {
            db,
            checkout,
            started_at: Instant::now(),
        }
    }
}

/// Build application router
///
/// `/health` and `/functions/validate-business-id` are public; everything
/// else goes through bearer token authentication.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    let protected = Router::new()
        // Queue functions
        .route(
            "/functions/analyze-sales-readiness",
            post(api::analyze_sales_readiness),
        )
        .route(
            "/functions/analyze-post-dd-readiness",
            post(api::analyze_post_dd_readiness),
        )
        .route("/functions/queue-dcf-analysis", post(api::queue_dcf_analysis))
        .route("/functions/analysis-status/:id", get(api::get_analysis_status))
        // Synchronous functions
        .route("/functions/simulate-valuation", post(api::simulate_valuation))
        .route("/functions/create-checkout", post(api::create_checkout))
        // Records
        .route(
            "/api/companies",
            post(api::create_company).get(api::list_companies),
        )
        .route(
            "/api/companies/:id",
            get(api::get_company)
                .put(api::update_company)
                .delete(api::delete_company),
        )
        .route(
            "/api/companies/:id/valuations",
            post(api::create_valuation).get(api::list_valuations),
        )
        .route(
            "/api/companies/:id/tasks",
            post(api::create_task).get(api::list_tasks),
        )
        .route("/api/tasks/:id", put(api::update_task).delete(api::delete_task))
        .route(
            "/api/companies/:id/ndas",
            post(api::create_nda).get(api::list_ndas),
        )
        .route("/api/ndas/:id/send", post(api::send_nda))
        .route("/api/ndas/:id/sign", post(api::sign_nda))
        .route("/api/ndas/:id/revoke", post(api::revoke_nda))
        .route("/api/companies/:id/assessments", get(api::list_assessments))
        .route(
            "/api/companies/:id/analysis-status",
            get(api::list_analysis_status),
        )
        .route(
            "/api/companies/:id/conversations",
            post(api::create_conversation).get(api::list_conversations),
        )
        .route(
            "/api/conversations/:id/messages",
            post(api::append_conversation_messages),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route(
            "/functions/validate-business-id",
            post(api::validate_business_id),
        )
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
