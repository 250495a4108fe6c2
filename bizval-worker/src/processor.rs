//! Job processing
//!
//! Turns one leased queue message into an outcome. Completed and failed
//! jobs are archived; a transient failure leaves the message leased so it
//! reappears after the visibility timeout, until `max_attempts` is used up.
//!
//! A job's writes and its `completed` status commit in one transaction, so
//! a failed attempt leaves nothing behind for the retry to duplicate.

use std::sync::Arc;

use bizval_common::db::{
    analysis_status, assessments, companies, tasks, valuations, AnalysisJob, AnalysisKind,
    Company, JobStatus, NewTask, TaskPriority, Valuation,
};
use bizval_common::dcf::{self, DcfAssumptions};
use bizval_common::queue::{self, QueueMessage};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::analyzer::{parse_json_reply, Analyzer};
use crate::error::{WorkerError, WorkerResult};
use crate::prompt;

/// What happened to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    /// Left leased for another attempt
    Retry,
    /// Archived without touching a status row (unreadable or already settled)
    Discarded,
}

/// Readiness reply from the model
#[derive(Debug, Deserialize)]
struct ReadinessReport {
    score: f64,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    tasks: Vec<SuggestedTask>,
}

#[derive(Debug, Deserialize)]
struct SuggestedTask {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    category: Option<String>,
    priority: Option<String>,
}

impl SuggestedTask {
    fn into_new_task(self) -> NewTask {
        let priority = match self.priority.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("high") => TaskPriority::High,
            Some("low") => TaskPriority::Low,
            _ => TaskPriority::Medium,
        };
        NewTask {
            title: self.title,
            description: self.description,
            category: self.category.filter(|c| !c.trim().is_empty()),
            priority,
        }
    }
}

pub struct Processor {
    pool: SqlitePool,
    analyzer: Arc<dyn Analyzer>,
    max_attempts: i64,
}

impl Processor {
    pub fn new(pool: SqlitePool, analyzer: Arc<dyn Analyzer>, max_attempts: i64) -> Self {
        Self {
            pool,
            analyzer,
            max_attempts,
        }
    }

    /// Handle one leased message
    ///
    /// Only bookkeeping failures (status row or archive writes) are returned
    /// as errors; job failures are recorded on the status row.
    pub async fn process(&self, message: &QueueMessage) -> bizval_common::Result<Outcome> {
        let job: AnalysisJob = match serde_json::from_value(message.message.0.clone()) {
            Ok(job) => job,
            Err(e) => {
                warn!(msg_id = message.msg_id, queue = %message.queue_name, "Unreadable job payload, archiving: {}", e);
                queue::archive(&self.pool, message.msg_id).await?;
                return Ok(Outcome::Discarded);
            }
        };

        // Already settled, e.g. a previous run crashed between update and archive
        let row = match analysis_status::get(&self.pool, job.status_id).await {
            Ok(row) if row.status != JobStatus::Processing => {
                queue::archive(&self.pool, message.msg_id).await?;
                return Ok(Outcome::Discarded);
            }
            Ok(row) => row,
            Err(bizval_common::Error::NotFound(_)) => {
                warn!(msg_id = message.msg_id, status_id = %job.status_id, "Status row missing, archiving");
                queue::archive(&self.pool, message.msg_id).await?;
                return Ok(Outcome::Discarded);
            }
            Err(e) => return Err(e),
        };

        if message.read_ct > self.max_attempts {
            warn!(
                msg_id = message.msg_id,
                status_id = %job.status_id,
                read_ct = message.read_ct,
                "Job exceeded max attempts"
            );
            let reason = match row.error {
                Some(last) => format!("exceeded max attempts: {}", last),
                None => "exceeded max attempts".to_string(),
            };
            analysis_status::mark_failed(&self.pool, job.status_id, &reason).await?;
            queue::archive(&self.pool, message.msg_id).await?;
            return Ok(Outcome::Failed);
        }

        match self.run(&job).await {
            Ok(()) => {
                queue::archive(&self.pool, message.msg_id).await?;
                info!(
                    msg_id = message.msg_id,
                    status_id = %job.status_id,
                    company_id = %job.company_id,
                    "{} completed",
                    job.kind.label()
                );
                Ok(Outcome::Completed)
            }
            Err(e) if e.is_transient() => {
                warn!(
                    msg_id = message.msg_id,
                    status_id = %job.status_id,
                    attempt = message.read_ct,
                    "Attempt failed, will retry: {}",
                    e
                );
                analysis_status::record_attempt_error(&self.pool, job.status_id, &e.to_string())
                    .await?;
                Ok(Outcome::Retry)
            }
            Err(e) => {
                error!(
                    msg_id = message.msg_id,
                    status_id = %job.status_id,
                    company_id = %job.company_id,
                    "{} failed: {}",
                    job.kind.label(),
                    e
                );
                analysis_status::mark_failed(&self.pool, job.status_id, &e.to_string()).await?;
                queue::archive(&self.pool, message.msg_id).await?;
                Ok(Outcome::Failed)
            }
        }
    }

    /// Run the job and commit its writes together with the `completed` status
    async fn run(&self, job: &AnalysisJob) -> WorkerResult<()> {
        let (company, valuation) = self.load_records(job).await?;
        match job.kind {
            AnalysisKind::SalesReadiness | AnalysisKind::PostDdReadiness => {
                self.run_readiness(job, &company, &valuation).await
            }
            AnalysisKind::Dcf => self.run_dcf(job, &company, &valuation).await,
        }
    }

    async fn load_records(&self, job: &AnalysisJob) -> WorkerResult<(Company, Valuation)> {
        let company = companies::get(&self.pool, job.company_id)
            .await?
            .ok_or_else(|| WorkerError::Permanent(format!("Company {} no longer exists", job.company_id)))?;
        let valuation_id = job
            .valuation_id
            .ok_or_else(|| WorkerError::Permanent("Job has no valuation".to_string()))?;
        let valuation = valuations::get_for_company(&self.pool, valuation_id, company.id).await?;
        Ok((company, valuation))
    }

    async fn run_readiness(
        &self,
        job: &AnalysisJob,
        company: &Company,
        valuation: &Valuation,
    ) -> WorkerResult<()> {
        let kind = job.kind;
        let prompt = prompt::readiness_prompt(kind, company, valuation);
        let reply = self.analyzer.complete(&prompt).await?;
        let value = parse_json_reply(&reply)?;
        let report: ReadinessReport = serde_json::from_value(value.clone())
            .map_err(|e| WorkerError::Transient(format!("Unexpected readiness reply: {}", e)))?;
        if !report.score.is_finite() {
            return Err(WorkerError::Transient("Readiness score is not a number".to_string()));
        }
        let score = report.score.round().clamp(0.0, 100.0) as i64;

        let mut tx = self.pool.begin().await?;
        let assessment = assessments::create(
            &mut *tx,
            company.id,
            Some(valuation.id),
            kind,
            score,
            &report.summary,
            value,
        )
        .await?;

        // Only the sales readiness analysis feeds the task list
        let created_tasks = if kind == AnalysisKind::SalesReadiness {
            let new_tasks = report.tasks.into_iter().map(SuggestedTask::into_new_task).collect();
            tasks::insert_generated(&mut tx, company.id, new_tasks).await?
        } else {
            Vec::new()
        };

        let result = json!({
            "assessmentId": assessment.id,
            "score": assessment.score,
            "summary": assessment.summary,
            "tasksCreated": created_tasks.len(),
        });
        analysis_status::mark_completed(&mut *tx, job.status_id, result).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn run_dcf(
        &self,
        job: &AnalysisJob,
        company: &Company,
        valuation: &Valuation,
    ) -> WorkerResult<()> {
        let (assumptions, result) = match &job.assumptions {
            Some(value) if !value.is_null() => {
                let assumptions: DcfAssumptions = serde_json::from_value(value.clone())
                    .map_err(|e| WorkerError::Permanent(format!("Invalid assumptions: {}", e)))?;
                // Supplied assumptions that cannot be evaluated fail the job
                let result = dcf::evaluate(&assumptions)?;
                (assumptions, result)
            }
            _ => {
                let assumptions = self.suggest_assumptions(company, valuation).await?;
                let result = dcf::evaluate(&assumptions).map_err(|e| {
                    WorkerError::Transient(format!("Model suggested unusable assumptions: {}", e))
                })?;
                (assumptions, result)
            }
        };

        let result_json = serde_json::to_value(&result)
            .map_err(|e| WorkerError::Permanent(format!("Serialize DCF result: {}", e)))?;

        let mut tx = self.pool.begin().await?;
        valuations::set_dcf_result(&mut *tx, valuation.id, result.equity_value, result_json.clone())
            .await?;
        let summary = json!({
            "valuationId": valuation.id,
            "assumptions": assumptions,
            "equityValue": result.equity_value,
            "dcf": result_json,
        });
        analysis_status::mark_completed(&mut *tx, job.status_id, summary).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Ask the model for assumptions; bad suggestions are retried
    async fn suggest_assumptions(
        &self,
        company: &Company,
        valuation: &Valuation,
    ) -> WorkerResult<DcfAssumptions> {
        let prompt = prompt::dcf_assumptions_prompt(company, valuation);
        let reply = self.analyzer.complete(&prompt).await?;
        let value = parse_json_reply(&reply)?;
        let assumptions: DcfAssumptions = serde_json::from_value(value)
            .map_err(|e| WorkerError::Transient(format!("Unexpected DCF reply: {}", e)))?;
        assumptions
            .validate()
            .map_err(|e| WorkerError::Transient(format!("Model suggested invalid assumptions: {}", e)))?;
        Ok(assumptions)
    }
}
