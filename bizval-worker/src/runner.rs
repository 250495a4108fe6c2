//! Poll loop
//!
//! Each cycle re-reads the worker settings, leases a batch from every
//! analysis queue and processes the messages one at a time. The loop ends
//! when the cancellation token fires; an in-flight message is finished first.
//!
//! A database error on one message or queue is logged and the cycle moves
//! on. The failed message is handed back so it is retried on the next cycle.

use std::sync::Arc;
use std::time::Duration;

use bizval_common::db::{settings, AnalysisKind};
use bizval_common::queue;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analyzer::Analyzer;
use crate::processor::{Outcome, Processor};

/// Tunables read from the `settings` table each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval_ms: u64,
    pub visibility_timeout_secs: i64,
    pub max_attempts: i64,
    pub batch_size: i64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            visibility_timeout_secs: 300,
            max_attempts: 3,
            batch_size: 5,
        }
    }
}

impl WorkerSettings {
    pub async fn load(pool: &SqlitePool) -> bizval_common::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            poll_interval_ms: settings::get_parsed(pool, "worker_poll_interval_ms", defaults.poll_interval_ms)
                .await?
                .max(100),
            visibility_timeout_secs: settings::get_parsed(
                pool,
                "worker_visibility_timeout_secs",
                defaults.visibility_timeout_secs,
            )
            .await?
            .max(1),
            max_attempts: settings::get_parsed(pool, "worker_max_attempts", defaults.max_attempts)
                .await?
                .max(1),
            batch_size: settings::get_parsed(pool, "worker_batch_size", defaults.batch_size)
                .await?
                .max(1),
        })
    }
}

/// Counts for one poll cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub discarded: usize,
    /// Messages or queues skipped after a database error
    pub errors: usize,
}

impl CycleStats {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.retried + self.discarded + self.errors
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Retry => self.retried += 1,
            Outcome::Discarded => self.discarded += 1,
        }
    }
}

pub struct Runner {
    pool: SqlitePool,
    analyzer: Arc<dyn Analyzer>,
}

impl Runner {
    pub fn new(pool: SqlitePool, analyzer: Arc<dyn Analyzer>) -> Self {
        Self { pool, analyzer }
    }

    /// Lease and process one batch from every queue
    pub async fn run_once(&self, settings: &WorkerSettings, cancel: &CancellationToken) -> CycleStats {
        let processor = Processor::new(self.pool.clone(), self.analyzer.clone(), settings.max_attempts);
        let mut stats = CycleStats::default();

        for kind in AnalysisKind::ALL {
            if cancel.is_cancelled() {
                break;
            }
            let messages = match queue::read(
                &self.pool,
                kind.queue_name(),
                settings.visibility_timeout_secs,
                settings.batch_size,
            )
            .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    error!(queue = kind.queue_name(), "Failed to read queue: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };

            for (index, message) in messages.iter().enumerate() {
                if cancel.is_cancelled() {
                    // Hand the rest of the batch back instead of waiting out the lease
                    for rest in &messages[index..] {
                        self.release(rest.msg_id).await;
                    }
                    break;
                }
                match processor.process(message).await {
                    Ok(outcome) => stats.record(outcome),
                    Err(e) => {
                        error!(
                            msg_id = message.msg_id,
                            queue = %message.queue_name,
                            "Failed to process message: {}",
                            e
                        );
                        stats.errors += 1;
                        self.release(message.msg_id).await;
                    }
                }
            }
        }

        stats
    }

    /// Make a leased message visible again
    async fn release(&self, msg_id: i64) {
        if let Err(e) = queue::set_vt(&self.pool, msg_id, 0).await {
            warn!(msg_id = msg_id, "Failed to release message, it stays leased: {}", e);
        }
    }

    /// Poll until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Worker polling queues: {}", queue_names());

        while !cancel.is_cancelled() {
            let settings = match WorkerSettings::load(&self.pool).await {
                Ok(settings) => settings,
                Err(e) => {
                    error!("Failed to load worker settings, using defaults: {}", e);
                    WorkerSettings::default()
                }
            };

            let stats = self.run_once(&settings, &cancel).await;
            if stats.total() > 0 {
                info!(
                    completed = stats.completed,
                    failed = stats.failed,
                    retried = stats.retried,
                    discarded = stats.discarded,
                    errors = stats.errors,
                    "Poll cycle finished"
                );
            } else {
                debug!("No visible messages");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(settings.poll_interval_ms)) => {}
            }
        }

        info!("Worker stopped");
    }
}

fn queue_names() -> String {
    AnalysisKind::ALL
        .iter()
        .map(|kind| kind.queue_name())
        .collect::<Vec<_>>()
        .join(", ")
}
