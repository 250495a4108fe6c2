//! Database models
//!
//! Records are serialized in camelCase because they are returned as-is by the
//! JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub business_id: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Company fields supplied on create
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompany {
    #[serde(default)]
    pub name: String,
    pub business_id: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

impl NewCompany {
    pub fn validate(&self) -> Result<()> {
        validate_company_fields(Some(&self.name), self.business_id.as_deref())
    }
}

/// Partial company update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub business_id: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

impl CompanyUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_company_fields(self.name.as_deref(), self.business_id.as_deref())
    }
}

fn validate_company_fields(name: Option<&str>, business_id: Option<&str>) -> Result<()> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("Company name must not be empty".to_string()));
        }
    }
    if let Some(id) = business_id {
        if !id.trim().is_empty() && !crate::is_valid_business_id(id) {
            return Err(Error::InvalidInput(format!("Invalid business ID: {}", id)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub id: Uuid,
    pub company_id: Uuid,
    pub revenue: f64,
    pub ebitda: f64,
    pub net_income: f64,
    pub book_equity: f64,
    pub net_debt: f64,
    pub revenue_multiple: f64,
    pub ebitda_multiple: f64,
    pub pe_multiple: f64,
    pub equity_value: Option<f64>,
    pub dcf_result: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

impl Valuation {
    pub fn financials(&self) -> crate::simulation::Financials {
        crate::simulation::Financials {
            revenue: self.revenue,
            ebitda: self.ebitda,
            net_income: self.net_income,
            book_equity: self.book_equity,
            net_debt: self.net_debt,
            revenue_multiple: self.revenue_multiple,
            ebitda_multiple: self.ebitda_multiple,
            pe_multiple: self.pe_multiple,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskSource {
    Manual,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub source: TaskSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
}

impl NewTask {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Task title must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidInput("Task title must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NdaStatus {
    Draft,
    Sent,
    Signed,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NdaDocument {
    pub id: Uuid,
    pub company_id: Uuid,
    pub recipient_name: String,
    pub recipient_email: String,
    pub status: NdaStatus,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNda {
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_email: String,
    #[serde(default)]
    pub content: String,
    /// Create directly in `sent` state instead of `draft`
    #[serde(default)]
    pub send: bool,
}

impl NewNda {
    pub fn validate(&self) -> Result<()> {
        if self.recipient_name.trim().is_empty() {
            return Err(Error::InvalidInput("recipientName must not be empty".to_string()));
        }
        if self.recipient_email.trim().is_empty() || !self.recipient_email.contains('@') {
            return Err(Error::InvalidInput(
                "recipientEmail must be a valid email address".to_string(),
            ));
        }
        Ok(())
    }
}

/// Kind of asynchronous analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AnalysisKind {
    SalesReadiness,
    PostDdReadiness,
    Dcf,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::SalesReadiness,
        AnalysisKind::PostDdReadiness,
        AnalysisKind::Dcf,
    ];

    /// Queue carrying jobs of this kind
    pub fn queue_name(&self) -> &'static str {
        match self {
            AnalysisKind::SalesReadiness => "sales_readiness",
            AnalysisKind::PostDdReadiness => "post_dd_readiness",
            AnalysisKind::Dcf => "dcf_analysis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::SalesReadiness => "Sales readiness analysis",
            AnalysisKind::PostDdReadiness => "Post due diligence readiness analysis",
            AnalysisKind::Dcf => "DCF analysis",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub valuation_id: Option<Uuid>,
    pub kind: AnalysisKind,
    pub score: i64,
    pub summary: String,
    pub details: Json<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub messages: Json<Vec<ChatMessage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// Tracking row for one queued analysis job
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub id: Uuid,
    pub kind: AnalysisKind,
    pub company_id: Uuid,
    pub valuation_id: Option<Uuid>,
    pub requested_by: Uuid,
    pub status: JobStatus,
    pub queue_message_id: Option<i64>,
    pub result: Option<Json<Value>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload carried by every analysis queue message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub status_id: Uuid,
    pub kind: AnalysisKind,
    pub company_id: Uuid,
    pub valuation_id: Option<Uuid>,
    pub requested_by: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<Value>,
}
