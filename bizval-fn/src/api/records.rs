//! Record CRUD routes
//!
//! Every route resolves the owning company first, so a caller only ever sees
//! records of companies they own. Foreign companies answer 403, unknown ids
//! answer 404.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizval_common::db::conversations::NewConversation;
use bizval_common::db::{
    assessments, companies, conversations, ndas, tasks, valuations, Assessment, ChatMessage,
    Company, CompanyUpdate, Conversation, NdaDocument, NdaStatus, NewCompany, NewNda, NewTask,
    Task, TaskUpdate, Valuation,
};
use bizval_common::simulation::Financials;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{json_body, AuthUser};
use crate::{ApiResult, AppState};

type Created<T> = (StatusCode, Json<T>);

fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

/// POST /api/companies
pub async fn create_company(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewCompany>, JsonRejection>,
) -> ApiResult<Created<Company>> {
    let company = companies::create(&state.db, user.id, json_body(payload)?).await?;
    info!(company_id = %company.id, user_id = %user.id, "Company created");
    Ok(created(company))
}

/// GET /api/companies
pub async fn list_companies(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Company>>> {
    Ok(Json(companies::list_for_owner(&state.db, user.id).await?))
}

/// GET /api/companies/:id
pub async fn get_company(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Company>> {
    Ok(Json(companies::get_owned(&state.db, id, user.id).await?))
}

/// PUT /api/companies/:id
pub async fn update_company(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<CompanyUpdate>, JsonRejection>,
) -> ApiResult<Json<Company>> {
    let company = companies::update(&state.db, id, user.id, json_body(payload)?).await?;
    Ok(Json(company))
}

/// DELETE /api/companies/:id
///
/// Cascades to every record of the company.
pub async fn delete_company(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    companies::delete(&state.db, id, user.id).await?;
    info!(company_id = %id, user_id = %user.id, "Company deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Valuations
// ---------------------------------------------------------------------------

/// POST /api/companies/:id/valuations
pub async fn create_valuation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
    payload: Result<Json<Financials>, JsonRejection>,
) -> ApiResult<Created<Valuation>> {
    let financials = json_body(payload)?;
    companies::get_owned(&state.db, company_id, user.id).await?;
    let valuation = valuations::create(&state.db, company_id, &financials).await?;
    Ok(created(valuation))
}

/// GET /api/companies/:id/valuations
pub async fn list_valuations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Valuation>>> {
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(Json(valuations::list_for_company(&state.db, company_id).await?))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// POST /api/companies/:id/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> ApiResult<Created<Task>> {
    let new_task = json_body(payload)?;
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(created(tasks::create(&state.db, company_id, new_task).await?))
}

/// GET /api/companies/:id/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Task>>> {
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(Json(tasks::list_for_company(&state.db, company_id).await?))
}

async fn owned_task(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Task> {
    let task = tasks::get(&state.db, id).await?;
    companies::get_owned(&state.db, task.company_id, user.id).await?;
    Ok(task)
}

/// PUT /api/tasks/:id
pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let changes = json_body(payload)?;
    owned_task(&state, &user, id).await?;
    Ok(Json(tasks::update(&state.db, id, changes).await?))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_task(&state, &user, id).await?;
    tasks::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// NDA documents
// ---------------------------------------------------------------------------

/// POST /api/companies/:id/ndas
pub async fn create_nda(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
    payload: Result<Json<NewNda>, JsonRejection>,
) -> ApiResult<Created<NdaDocument>> {
    let new_nda = json_body(payload)?;
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(created(ndas::create(&state.db, company_id, new_nda).await?))
}

/// GET /api/companies/:id/ndas
pub async fn list_ndas(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<NdaDocument>>> {
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(Json(ndas::list_for_company(&state.db, company_id).await?))
}

async fn transition_nda(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    to: NdaStatus,
) -> ApiResult<Json<NdaDocument>> {
    let nda = ndas::get(&state.db, id).await?;
    companies::get_owned(&state.db, nda.company_id, user.id).await?;
    let nda = ndas::transition(&state.db, id, to).await?;
    info!(nda_id = %id, company_id = %nda.company_id, status = ?nda.status, "NDA status changed");
    Ok(Json(nda))
}

/// POST /api/ndas/:id/send
pub async fn send_nda(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NdaDocument>> {
    transition_nda(&state, &user, id, NdaStatus::Sent).await
}

/// POST /api/ndas/:id/sign
pub async fn sign_nda(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NdaDocument>> {
    transition_nda(&state, &user, id, NdaStatus::Signed).await
}

/// POST /api/ndas/:id/revoke
pub async fn revoke_nda(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NdaDocument>> {
    transition_nda(&state, &user, id, NdaStatus::Revoked).await
}

// ---------------------------------------------------------------------------
// Assessments
// ---------------------------------------------------------------------------

/// GET /api/companies/:id/assessments
pub async fn list_assessments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Assessment>>> {
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(Json(assessments::list_for_company(&state.db, company_id).await?))
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// POST /api/companies/:id/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
    payload: Result<Json<NewConversation>, JsonRejection>,
) -> ApiResult<Created<Conversation>> {
    let new_conversation = json_body(payload)?;
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(created(
        conversations::create(&state.db, company_id, new_conversation).await?,
    ))
}

/// GET /api/companies/:id/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Conversation>>> {
    companies::get_owned(&state.db, company_id, user.id).await?;
    Ok(Json(conversations::list_for_company(&state.db, company_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AppendMessagesRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// POST /api/conversations/:id/messages
pub async fn append_conversation_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AppendMessagesRequest>, JsonRejection>,
) -> ApiResult<Json<Conversation>> {
    let request = json_body(payload)?;
    let conversation = conversations::get(&state.db, id).await?;
    companies::get_owned(&state.db, conversation.company_id, user.id).await?;
    Ok(Json(
        conversations::append_messages(&state.db, id, request.messages).await?,
    ))
}
