//! Valuation records

use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::models::Valuation;
use crate::simulation::Financials;
use crate::{Error, Result};

const COLUMNS: &str = "id, company_id, revenue, ebitda, net_income, book_equity, net_debt, \
     revenue_multiple, ebitda_multiple, pe_multiple, equity_value, dcf_result, created_at";

/// Store a valuation snapshot
///
/// `equity_value` starts as the mean of the applicable multiple-based methods,
/// or NULL when none applies. A completed DCF job overwrites it.
pub async fn create(pool: &SqlitePool, company_id: Uuid, f: &Financials) -> Result<Valuation> {
    let numbers = [
        f.revenue,
        f.ebitda,
        f.net_income,
        f.book_equity,
        f.net_debt,
        f.revenue_multiple,
        f.ebitda_multiple,
        f.pe_multiple,
    ];
    if numbers.iter().any(|n| !n.is_finite()) {
        return Err(Error::InvalidInput("Financial figures must be finite numbers".to_string()));
    }

    let equity_value = initial_equity_value(f);
    let valuation = Valuation {
        id: Uuid::new_v4(),
        company_id,
        revenue: f.revenue,
        ebitda: f.ebitda,
        net_income: f.net_income,
        book_equity: f.book_equity,
        net_debt: f.net_debt,
        revenue_multiple: f.revenue_multiple,
        ebitda_multiple: f.ebitda_multiple,
        pe_multiple: f.pe_multiple,
        equity_value,
        dcf_result: None,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO valuations (
            id, company_id, revenue, ebitda, net_income, book_equity, net_debt,
            revenue_multiple, ebitda_multiple, pe_multiple, equity_value, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(valuation.id)
    .bind(valuation.company_id)
    .bind(valuation.revenue)
    .bind(valuation.ebitda)
    .bind(valuation.net_income)
    .bind(valuation.book_equity)
    .bind(valuation.net_debt)
    .bind(valuation.revenue_multiple)
    .bind(valuation.ebitda_multiple)
    .bind(valuation.pe_multiple)
    .bind(valuation.equity_value)
    .bind(valuation.created_at)
    .execute(pool)
    .await?;

    Ok(valuation)
}

fn initial_equity_value(f: &Financials) -> Option<f64> {
    use crate::simulation::Method;

    let values: Vec<f64> = [Method::Revenue, Method::Ebitda, Method::Earnings]
        .iter()
        .filter_map(|m| m.equity_value(f))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Valuation>> {
    let valuation = sqlx::query_as::<_, Valuation>(&format!(
        "SELECT {} FROM valuations WHERE id = ?",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(valuation)
}

/// Load a valuation that must belong to `company_id`
pub async fn get_for_company(pool: &SqlitePool, id: Uuid, company_id: Uuid) -> Result<Valuation> {
    match get(pool, id).await? {
        Some(v) if v.company_id == company_id => Ok(v),
        _ => Err(Error::NotFound(format!(
            "Valuation {} not found for company {}",
            id, company_id
        ))),
    }
}

pub async fn list_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<Valuation>> {
    let valuations = sqlx::query_as::<_, Valuation>(&format!(
        "SELECT {} FROM valuations WHERE company_id = ? ORDER BY created_at DESC",
        COLUMNS
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(valuations)
}

/// Record a DCF outcome on the valuation
pub async fn set_dcf_result<'e, E>(
    executor: E,
    id: Uuid,
    equity_value: f64,
    dcf_result: Value,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let updated = sqlx::query("UPDATE valuations SET equity_value = ?, dcf_result = ? WHERE id = ?")
        .bind(equity_value)
        .bind(Json(dcf_result))
        .bind(id)
        .execute(executor)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!("Valuation not found: {}", id)));
    }
    Ok(())
}
