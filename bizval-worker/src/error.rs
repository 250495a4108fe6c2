//! Worker error classification
//!
//! A transient error leaves the message leased so it is retried once the
//! visibility timeout passes. A permanent error fails the job immediately.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Retrying may succeed (network, rate limit, unparsable model output)
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot succeed (missing records, invalid input)
    #[error("{0}")]
    Permanent(String),
}

impl WorkerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkerError::Transient(_))
    }
}

impl From<bizval_common::Error> for WorkerError {
    fn from(err: bizval_common::Error) -> Self {
        use bizval_common::Error as E;
        match err {
            E::NotFound(_) | E::InvalidInput(_) | E::Forbidden(_) | E::Conflict(_) => {
                WorkerError::Permanent(err.to_string())
            }
            other => WorkerError::Transient(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for WorkerError {
    fn from(err: sqlx::Error) -> Self {
        bizval_common::Error::from(err).into()
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
