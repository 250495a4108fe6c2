//! Shared API request/response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::JobStatus;

/// Error envelope returned by every endpoint on failure
///
/// ```
/// use bizval_common::api::types::ErrorBody;
///
/// let body = ErrorBody::new("companyId is required");
/// assert!(!body.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 202 body returned by the queue functions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedResponse {
    pub success: bool,
    pub message: String,
    pub queue_message_id: i64,
    pub status_id: Uuid,
    pub status: JobStatus,
}
