//! Company records
//!
//! Every caller-facing lookup goes through [`get_owned`], which separates
//! "does not exist" (404) from "exists but belongs to someone else" (403).

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::{Company, CompanyUpdate, NewCompany};
use crate::{Error, Result};

const COLUMNS: &str =
    "id, owner_id, name, business_id, industry, description, created_at, updated_at";

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn create(pool: &SqlitePool, owner_id: Uuid, new: NewCompany) -> Result<Company> {
    new.validate()?;

    let now = Utc::now();
    let company = Company {
        id: Uuid::new_v4(),
        owner_id,
        name: new.name.trim().to_string(),
        business_id: blank_to_none(new.business_id),
        industry: blank_to_none(new.industry),
        description: blank_to_none(new.description),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO companies (id, owner_id, name, business_id, industry, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(company.id)
    .bind(company.owner_id)
    .bind(&company.name)
    .bind(&company.business_id)
    .bind(&company.industry)
    .bind(&company.description)
    .bind(company.created_at)
    .bind(company.updated_at)
    .execute(pool)
    .await?;

    Ok(company)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Company>> {
    let company = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(company)
}

/// Load a company the caller owns
pub async fn get_owned(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<Company> {
    let company = get(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Company not found: {}", id)))?;

    if company.owner_id != user_id {
        return Err(Error::Forbidden(format!(
            "Company {} is not accessible to this user",
            id
        )));
    }
    Ok(company)
}

pub async fn list_for_owner(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<Company>> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        "SELECT {} FROM companies WHERE owner_id = ? ORDER BY created_at, name",
        COLUMNS
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

pub async fn update(
    pool: &SqlitePool,
    id: Uuid,
    user_id: Uuid,
    changes: CompanyUpdate,
) -> Result<Company> {
    changes.validate()?;
    let mut company = get_owned(pool, id, user_id).await?;

    if let Some(name) = changes.name {
        company.name = name.trim().to_string();
    }
    if changes.business_id.is_some() {
        company.business_id = blank_to_none(changes.business_id);
    }
    if changes.industry.is_some() {
        company.industry = blank_to_none(changes.industry);
    }
    if changes.description.is_some() {
        company.description = blank_to_none(changes.description);
    }
    company.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE companies
        SET name = ?, business_id = ?, industry = ?, description = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&company.name)
    .bind(&company.business_id)
    .bind(&company.industry)
    .bind(&company.description)
    .bind(company.updated_at)
    .bind(company.id)
    .execute(pool)
    .await?;

    Ok(company)
}

/// Delete a company and (via cascade) everything attached to it
pub async fn delete(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<()> {
    get_owned(pool, id, user_id).await?;
    sqlx::query("DELETE FROM companies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
