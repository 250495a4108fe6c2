//! Record CRUD, ownership checks and analysis enqueue tracking

use bizval_common::db::init::init_database;
use bizval_common::db::{
    analysis_status, companies, conversations, ndas, tasks, users, valuations, AnalysisKind,
    ChatMessage, CompanyUpdate, JobStatus, NdaStatus, NewCompany, NewNda, NewTask, TaskSource,
    TaskStatus, TaskUpdate,
};
use bizval_common::simulation::Financials;
use bizval_common::{queue, Error};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn setup() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("bizval.db")).await.unwrap();
    (dir, pool)
}

async fn user(pool: &SqlitePool, email: &str) -> Uuid {
    users::issue_token(pool, email).await.unwrap().0.id
}

fn company(name: &str) -> NewCompany {
    NewCompany {
        name: name.to_string(),
        ..Default::default()
    }
}

fn financials() -> Financials {
    Financials {
        revenue: 1_000_000.0,
        ebitda: 200_000.0,
        net_income: 100_000.0,
        book_equity: 300_000.0,
        net_debt: 0.0,
        revenue_multiple: 1.0,
        ebitda_multiple: 5.0,
        pe_multiple: 10.0,
    }
}

#[tokio::test]
async fn test_token_lookup_and_rotation() {
    let (_dir, pool) = setup().await;

    let (first_user, first_token) = users::issue_token(&pool, "owner@example.com").await.unwrap();
    let found = users::find_by_token(&pool, &first_token).await.unwrap().unwrap();
    assert_eq!(found.id, first_user.id);

    let (same_user, second_token) = users::issue_token(&pool, "owner@example.com").await.unwrap();
    assert_eq!(same_user.id, first_user.id);
    assert!(users::find_by_token(&pool, &first_token).await.unwrap().is_none());
    assert!(users::find_by_token(&pool, &second_token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_company_ownership() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let other = user(&pool, "other@example.com").await;

    let created = companies::create(&pool, owner, company("  Acme Oy ")).await.unwrap();
    assert_eq!(created.name, "Acme Oy");

    assert!(companies::get_owned(&pool, created.id, owner).await.is_ok());
    assert!(matches!(
        companies::get_owned(&pool, created.id, other).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        companies::get_owned(&pool, Uuid::new_v4(), owner).await,
        Err(Error::NotFound(_))
    ));

    assert_eq!(companies::list_for_owner(&pool, owner).await.unwrap().len(), 1);
    assert!(companies::list_for_owner(&pool, other).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_company_update_and_delete() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let created = companies::create(&pool, owner, company("Acme")).await.unwrap();

    let updated = companies::update(
        &pool,
        created.id,
        owner,
        CompanyUpdate {
            business_id: Some("0737546-2".to_string()),
            industry: Some("Retail".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Acme");
    assert_eq!(updated.business_id.as_deref(), Some("0737546-2"));

    let bad = companies::update(
        &pool,
        created.id,
        owner,
        CompanyUpdate {
            business_id: Some("0737546-9".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(bad, Err(Error::InvalidInput(_))));

    companies::delete(&pool, created.id, owner).await.unwrap();
    assert!(companies::get(&pool, created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_company_name_rejected() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let result = companies::create(&pool, owner, company("   ")).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_valuation_belongs_to_company() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let a = companies::create(&pool, owner, company("A")).await.unwrap();
    let b = companies::create(&pool, owner, company("B")).await.unwrap();

    let valuation = valuations::create(&pool, a.id, &financials()).await.unwrap();
    // revenue 1.0M, ebitda 1.0M, earnings 1.0M
    assert_eq!(valuation.equity_value, Some(1_000_000.0));

    assert!(valuations::get_for_company(&pool, valuation.id, a.id).await.is_ok());
    assert!(matches!(
        valuations::get_for_company(&pool, valuation.id, b.id).await,
        Err(Error::NotFound(_))
    ));

    valuations::set_dcf_result(&pool, valuation.id, 42.0, json!({"enterpriseValue": 42.0}))
        .await
        .unwrap();
    let reloaded = valuations::get(&pool, valuation.id).await.unwrap().unwrap();
    assert_eq!(reloaded.equity_value, Some(42.0));
    assert_eq!(reloaded.dcf_result.unwrap().0["enterpriseValue"], 42.0);
}

#[tokio::test]
async fn test_enqueue_creates_row_and_message_together() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let c = companies::create(&pool, owner, company("Acme")).await.unwrap();
    let v = valuations::create(&pool, c.id, &financials()).await.unwrap();

    let status = analysis_status::enqueue(
        &pool,
        AnalysisKind::SalesReadiness,
        c.id,
        Some(v.id),
        owner,
        None,
    )
    .await
    .unwrap();

    assert_eq!(status.status, JobStatus::Processing);
    let msg_id = status.queue_message_id.unwrap();

    let stored = analysis_status::get(&pool, status.id).await.unwrap();
    assert_eq!(stored.queue_message_id, Some(msg_id));
    assert_eq!(stored.status, JobStatus::Processing);

    let messages = queue::read(&pool, "sales_readiness", 30, 10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].msg_id, msg_id);
    assert_eq!(messages[0].message.0["statusId"], status.id.to_string());
    assert_eq!(messages[0].message.0["kind"], "sales_readiness");
}

#[tokio::test]
async fn test_status_transitions() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let c = companies::create(&pool, owner, company("Acme")).await.unwrap();
    let status = analysis_status::enqueue(&pool, AnalysisKind::Dcf, c.id, None, owner, None)
        .await
        .unwrap();

    analysis_status::record_attempt_error(&pool, status.id, "timeout").await.unwrap();
    let row = analysis_status::get(&pool, status.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    assert_eq!(row.error.as_deref(), Some("timeout"));

    analysis_status::mark_completed(&pool, status.id, json!({"ok": true})).await.unwrap();
    let row = analysis_status::get(&pool, status.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    assert!(row.error.is_none());
    assert_eq!(row.result.unwrap().0, json!({"ok": true}));
}

#[tokio::test]
async fn test_tasks_crud() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let c = companies::create(&pool, owner, company("Acme")).await.unwrap();

    let task = tasks::create(
        &pool,
        c.id,
        NewTask {
            title: "Audit contracts".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(task.category, "general");
    assert_eq!(task.source, TaskSource::Manual);

    let updated = tasks::update(
        &pool,
        task.id,
        TaskUpdate {
            status: Some(TaskStatus::Done),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.status, TaskStatus::Done);

    let generated = tasks::create_generated(
        &pool,
        c.id,
        vec![
            NewTask {
                title: "Clean up cap table".to_string(),
                ..Default::default()
            },
            NewTask::default(),
        ],
    )
    .await
    .unwrap();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].source, TaskSource::Ai);

    assert_eq!(tasks::list_for_company(&pool, c.id).await.unwrap().len(), 2);

    tasks::delete(&pool, task.id).await.unwrap();
    assert!(matches!(tasks::delete(&pool, task.id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_nda_lifecycle() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let c = companies::create(&pool, owner, company("Acme")).await.unwrap();

    let nda = ndas::create(
        &pool,
        c.id,
        NewNda {
            recipient_name: "Buyer Ltd".to_string(),
            recipient_email: "deals@buyer.example".to_string(),
            content: "Terms".to_string(),
            send: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(nda.status, NdaStatus::Sent);

    let signed = ndas::transition(&pool, nda.id, NdaStatus::Signed).await.unwrap();
    assert_eq!(signed.status, NdaStatus::Signed);
    assert!(signed.signed_at.is_some());

    let revoked = ndas::transition(&pool, nda.id, NdaStatus::Revoked).await.unwrap();
    assert_eq!(revoked.status, NdaStatus::Revoked);

    assert!(matches!(
        ndas::transition(&pool, nda.id, NdaStatus::Signed).await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test]
async fn test_conversation_append() {
    let (_dir, pool) = setup().await;
    let owner = user(&pool, "owner@example.com").await;
    let c = companies::create(&pool, owner, company("Acme")).await.unwrap();

    let conversation = conversations::create(&pool, c.id, Default::default()).await.unwrap();
    assert_eq!(conversation.title, "Untitled conversation");

    let updated = conversations::append_messages(
        &pool,
        conversation.id,
        vec![ChatMessage {
            role: "user".to_string(),
            content: "What drives my valuation?".to_string(),
        }],
    )
    .await
    .unwrap();
    assert_eq!(updated.messages.0.len(), 1);

    let bad_role = conversations::append_messages(
        &pool,
        conversation.id,
        vec![ChatMessage {
            role: "robot".to_string(),
            content: "hi".to_string(),
        }],
    )
    .await;
    assert!(matches!(bad_role, Err(Error::InvalidInput(_))));
}
