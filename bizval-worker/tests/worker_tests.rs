//! End-to-end worker tests against a throwaway database
//!
//! Jobs are enqueued the same way bizval-fn does it and processed with a
//! scripted analyzer in place of the model API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bizval_common::db::{
    analysis_status, assessments, companies, init_database, tasks, users, valuations,
    AnalysisKind, JobStatus, NewCompany, TaskSource,
};
use bizval_common::queue;
use bizval_common::simulation::Financials;
use bizval_worker::prompt::Prompt;
use bizval_worker::{Analyzer, Runner, WorkerError, WorkerResult, WorkerSettings};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Analyzer replaying scripted replies in order
#[derive(Default)]
struct ScriptedAnalyzer {
    replies: Mutex<VecDeque<WorkerResult<String>>>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    fn with(replies: Vec<WorkerResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn complete(&self, _prompt: &Prompt) -> WorkerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WorkerError::Transient("no scripted reply".to_string())))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    pool: SqlitePool,
    user_id: Uuid,
    company_id: Uuid,
    valuation_id: Uuid,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("bizval.db")).await.unwrap();
        let (user, _) = users::issue_token(&pool, "owner@example.com").await.unwrap();
        let company = companies::create(
            &pool,
            user.id,
            NewCompany {
                name: "Acme Oy".to_string(),
                industry: Some("Wholesale".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let valuation = valuations::create(
            &pool,
            company.id,
            &Financials {
                revenue: 3_000_000.0,
                ebitda: 450_000.0,
                net_income: 280_000.0,
                book_equity: 900_000.0,
                net_debt: 200_000.0,
                revenue_multiple: 0.8,
                ebitda_multiple: 5.0,
                pe_multiple: 8.0,
            },
        )
        .await
        .unwrap();
        Self {
            _dir: dir,
            pool,
            user_id: user.id,
            company_id: company.id,
            valuation_id: valuation.id,
        }
    }

    async fn enqueue(&self, kind: AnalysisKind, assumptions: Option<Value>) -> Uuid {
        analysis_status::enqueue(
            &self.pool,
            kind,
            self.company_id,
            Some(self.valuation_id),
            self.user_id,
            assumptions,
        )
        .await
        .unwrap()
        .id
    }

    fn runner(&self, analyzer: Arc<ScriptedAnalyzer>) -> Runner {
        Runner::new(self.pool.clone(), analyzer)
    }
}

fn readiness_reply() -> String {
    json!({
        "score": 131.4,
        "summary": "Solid numbers, weak documentation.",
        "tasks": [
            {"title": "Write down key processes", "priority": "high", "category": "operations"},
            {"title": "", "description": "skipped, no title"},
            {"title": "Renew top customer contracts", "priority": "medium"}
        ]
    })
    .to_string()
}

fn dcf_assumptions() -> Value {
    json!({
        "baseFreeCashFlow": 300000.0,
        "growthRate": 0.04,
        "discountRate": 0.12,
        "terminalGrowthRate": 0.02,
        "years": 5,
        "netDebt": 200000.0
    })
}

#[tokio::test]
async fn test_sales_readiness_job_completes() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let analyzer = ScriptedAnalyzer::with(vec![Ok(format!("```json\n{}\n```", readiness_reply()))]);

    let stats = fx
        .runner(analyzer.clone())
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.completed, 1);
    assert_eq!(analyzer.calls(), 1);

    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    let result = row.result.unwrap().0;
    assert_eq!(result["score"], 100);
    assert_eq!(result["tasksCreated"], 2);

    let stored = assessments::list_for_company(&fx.pool, fx.company_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].score, 100);
    assert_eq!(stored[0].kind, AnalysisKind::SalesReadiness);

    let generated = tasks::list_for_company(&fx.pool, fx.company_id).await.unwrap();
    assert_eq!(generated.len(), 2);
    assert!(generated.iter().all(|t| t.source == TaskSource::Ai));

    assert_eq!(queue::depth(&fx.pool, "sales_readiness").await.unwrap(), 0);
}

#[tokio::test]
async fn test_post_dd_readiness_creates_no_tasks() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::PostDdReadiness, None).await;
    let analyzer = ScriptedAnalyzer::with(vec![Ok(readiness_reply())]);

    fx.runner(analyzer)
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;

    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    assert_eq!(assessments::list_for_company(&fx.pool, fx.company_id).await.unwrap().len(), 1);
    assert!(tasks::list_for_company(&fx.pool, fx.company_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dcf_job_with_supplied_assumptions() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::Dcf, Some(dcf_assumptions())).await;
    let analyzer = ScriptedAnalyzer::with(vec![]);

    let stats = fx
        .runner(analyzer.clone())
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.completed, 1);
    assert_eq!(analyzer.calls(), 0);

    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    let equity = row.result.unwrap().0["equityValue"].as_f64().unwrap();
    assert!(equity > 0.0);

    let valuation = valuations::get(&fx.pool, fx.valuation_id).await.unwrap().unwrap();
    assert_eq!(valuation.equity_value, Some(equity));
    assert!(valuation.dcf_result.is_some());
}

#[tokio::test]
async fn test_dcf_job_asks_model_for_assumptions() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::Dcf, None).await;
    let analyzer = ScriptedAnalyzer::with(vec![Ok(dcf_assumptions().to_string())]);

    fx.runner(analyzer.clone())
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;

    assert_eq!(analyzer.calls(), 1);
    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    assert_eq!(row.result.unwrap().0["assumptions"]["years"], 5);
}

#[tokio::test]
async fn test_transient_failures_retry_then_fail() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let analyzer = ScriptedAnalyzer::with(vec![
        Err(WorkerError::Transient("timeout".to_string())),
        Ok("not json at all".to_string()),
        Err(WorkerError::Transient("429".to_string())),
    ]);
    let runner = fx.runner(analyzer.clone());
    let cancel = CancellationToken::new();

    // Zero lease so the message is visible again on the next cycle
    let settings = WorkerSettings {
        visibility_timeout_secs: 0,
        max_attempts: 3,
        ..WorkerSettings::default()
    };

    for attempt in 1..=3 {
        let stats = runner.run_once(&settings, &cancel).await;
        assert_eq!(stats.retried, 1, "attempt {}", attempt);
        let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
        assert_eq!(row.status, JobStatus::Processing);
        assert!(row.error.is_some());
    }

    let stats = runner.run_once(&settings, &cancel).await;
    assert_eq!(stats.failed, 1);
    assert_eq!(analyzer.calls(), 3);

    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Failed);
    assert_eq!(row.error.as_deref(), Some("exceeded max attempts: 429"));
    assert_eq!(queue::depth(&fx.pool, "sales_readiness").await.unwrap(), 0);
}

#[tokio::test]
async fn test_retry_waits_for_visibility_timeout() {
    let fx = Fixture::new().await;
    fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let analyzer = ScriptedAnalyzer::with(vec![Err(WorkerError::Transient("timeout".to_string()))]);
    let runner = fx.runner(analyzer.clone());
    let cancel = CancellationToken::new();

    let stats = runner.run_once(&WorkerSettings::default(), &cancel).await;
    assert_eq!(stats.retried, 1);

    // Still leased: nothing to do on the next cycle
    let stats = runner.run_once(&WorkerSettings::default(), &cancel).await;
    assert_eq!(stats.total(), 0);
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(queue::depth(&fx.pool, "sales_readiness").await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_assumptions_fail_immediately() {
    let fx = Fixture::new().await;
    let mut assumptions = dcf_assumptions();
    assumptions["discountRate"] = json!(0.01);
    let status_id = fx.enqueue(AnalysisKind::Dcf, Some(assumptions)).await;

    let stats = fx
        .runner(ScriptedAnalyzer::with(vec![]))
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.failed, 1);

    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Failed);
    assert_eq!(queue::depth(&fx.pool, "dcf_analysis").await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreadable_message_is_discarded() {
    let fx = Fixture::new().await;
    queue::send(&fx.pool, "sales_readiness", &json!({"hello": "world"}))
        .await
        .unwrap();

    let stats = fx
        .runner(ScriptedAnalyzer::with(vec![]))
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.discarded, 1);
    assert_eq!(queue::depth(&fx.pool, "sales_readiness").await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancelled_runner_leaves_queue_alone() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = fx
        .runner(ScriptedAnalyzer::with(vec![]))
        .run_once(&WorkerSettings::default(), &cancel)
        .await;
    assert_eq!(stats.total(), 0);

    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    assert_eq!(queue::read(&fx.pool, "sales_readiness", 30, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_loaded_from_database() {
    let fx = Fixture::new().await;
    assert_eq!(WorkerSettings::load(&fx.pool).await.unwrap(), WorkerSettings::default());

    bizval_common::db::settings::set_setting(&fx.pool, "worker_batch_size", "12")
        .await
        .unwrap();
    bizval_common::db::settings::set_setting(&fx.pool, "worker_max_attempts", "0")
        .await
        .unwrap();
    let loaded = WorkerSettings::load(&fx.pool).await.unwrap();
    assert_eq!(loaded.batch_size, 12);
    assert_eq!(loaded.max_attempts, 1);
}

/// Reply once and cancel the runner while the job is in flight
struct CancellingAnalyzer {
    cancel: CancellationToken,
    reply: String,
}

#[async_trait]
impl Analyzer for CancellingAnalyzer {
    async fn complete(&self, _prompt: &Prompt) -> WorkerResult<String> {
        self.cancel.cancel();
        Ok(self.reply.clone())
    }
}

async fn execute(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

#[tokio::test]
async fn test_cancel_mid_batch_finishes_job_and_releases_rest() {
    let fx = Fixture::new().await;
    let first = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let second = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    fx.enqueue(AnalysisKind::Dcf, Some(dcf_assumptions())).await;

    let cancel = CancellationToken::new();
    let analyzer = Arc::new(CancellingAnalyzer {
        cancel: cancel.clone(),
        reply: readiness_reply(),
    });
    let stats = Runner::new(fx.pool.clone(), analyzer)
        .run_once(&WorkerSettings::default(), &cancel)
        .await;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total(), 1);

    let row = analysis_status::get(&fx.pool, first).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    let row = analysis_status::get(&fx.pool, second).await.unwrap();
    assert_eq!(row.status, JobStatus::Processing);

    // Released despite the 300 s lease
    let released = queue::read(&fx.pool, "sales_readiness", 30, 10).await.unwrap();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].message.0["statusId"], json!(second));

    // Later queues were not touched
    assert_eq!(queue::read(&fx.pool, "dcf_analysis", 30, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_database_error_on_one_message_does_not_stall_cycle() {
    let fx = Fixture::new().await;
    let blocked = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let healthy = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    let dcf = fx.enqueue(AnalysisKind::Dcf, Some(dcf_assumptions())).await;

    execute(
        &fx.pool,
        &format!(
            "CREATE TRIGGER block_status BEFORE UPDATE ON analysis_status WHEN OLD.id = x'{}' \
             BEGIN SELECT RAISE(ABORT, 'status row locked'); END",
            blocked.simple()
        ),
    )
    .await;

    let analyzer = ScriptedAnalyzer::with(vec![Ok(readiness_reply()), Ok(readiness_reply())]);
    let stats = fx
        .runner(analyzer)
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.completed, 2);

    for id in [healthy, dcf] {
        let row = analysis_status::get(&fx.pool, id).await.unwrap();
        assert_eq!(row.status, JobStatus::Completed);
    }
    let row = analysis_status::get(&fx.pool, blocked).await.unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    // The blocked job's writes were rolled back
    assert_eq!(assessments::list_for_company(&fx.pool, fx.company_id).await.unwrap().len(), 1);

    // Handed back right away, and picked up once the database recovers
    execute(&fx.pool, "DROP TRIGGER block_status").await;
    let stats = fx
        .runner(ScriptedAnalyzer::with(vec![Ok(readiness_reply())]))
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.completed, 1);
    let row = analysis_status::get(&fx.pool, blocked).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_failed_attempt_leaves_no_partial_results() {
    let fx = Fixture::new().await;
    let status_id = fx.enqueue(AnalysisKind::SalesReadiness, None).await;
    execute(
        &fx.pool,
        "CREATE TRIGGER block_tasks BEFORE INSERT ON tasks \
         BEGIN SELECT RAISE(ABORT, 'tasks unavailable'); END",
    )
    .await;

    let analyzer = ScriptedAnalyzer::with(vec![
        Ok(readiness_reply()),
        Ok(readiness_reply()),
        Ok(readiness_reply()),
    ]);
    let runner = fx.runner(analyzer);
    let cancel = CancellationToken::new();
    let settings = WorkerSettings {
        visibility_timeout_secs: 0,
        ..WorkerSettings::default()
    };

    for attempt in 1..=2 {
        let stats = runner.run_once(&settings, &cancel).await;
        assert_eq!(stats.retried, 1, "attempt {}", attempt);
    }
    assert!(assessments::list_for_company(&fx.pool, fx.company_id).await.unwrap().is_empty());
    assert!(tasks::list_for_company(&fx.pool, fx.company_id).await.unwrap().is_empty());
    let row = analysis_status::get(&fx.pool, status_id).await.unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    assert!(row.error.unwrap().contains("tasks unavailable"));

    execute(&fx.pool, "DROP TRIGGER block_tasks").await;
    let stats = runner.run_once(&settings, &cancel).await;
    assert_eq!(stats.completed, 1);
    assert_eq!(assessments::list_for_company(&fx.pool, fx.company_id).await.unwrap().len(), 1);
    assert_eq!(tasks::list_for_company(&fx.pool, fx.company_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_overflowing_dcf_assumptions() {
    let fx = Fixture::new().await;
    let mut overflowing = dcf_assumptions();
    overflowing["growthRate"] = json!(1e200);
    overflowing["years"] = json!(3);

    // Supplied: the job fails for good and the valuation is untouched
    let before = valuations::get(&fx.pool, fx.valuation_id).await.unwrap().unwrap();
    let supplied = fx.enqueue(AnalysisKind::Dcf, Some(overflowing.clone())).await;
    let stats = fx
        .runner(ScriptedAnalyzer::with(vec![]))
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.failed, 1);
    let row = analysis_status::get(&fx.pool, supplied).await.unwrap();
    assert_eq!(row.status, JobStatus::Failed);
    let valuation = valuations::get(&fx.pool, fx.valuation_id).await.unwrap().unwrap();
    assert_eq!(valuation.equity_value, before.equity_value);
    assert!(valuation.dcf_result.is_none());

    // Suggested by the model: retried
    let suggested = fx.enqueue(AnalysisKind::Dcf, None).await;
    let stats = fx
        .runner(ScriptedAnalyzer::with(vec![Ok(overflowing.to_string())]))
        .run_once(&WorkerSettings::default(), &CancellationToken::new())
        .await;
    assert_eq!(stats.retried, 1);
    let row = analysis_status::get(&fx.pool, suggested).await.unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    assert!(row.error.unwrap().contains("unusable assumptions"));
}
