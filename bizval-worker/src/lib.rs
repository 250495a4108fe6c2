//! bizval-worker library - analysis queue consumer
//!
//! Leases jobs from the `sales_readiness`, `post_dd_readiness` and
//! `dcf_analysis` queues, runs them through the analysis model and writes
//! assessments, tasks and DCF results back to bizval.db.

pub mod analyzer;
pub mod error;
pub mod processor;
pub mod prompt;
pub mod runner;

pub use analyzer::{Analyzer, LlmAnalyzer};
pub use error::{WorkerError, WorkerResult};
pub use processor::{Outcome, Processor};
pub use runner::{CycleStats, Runner, WorkerSettings};
