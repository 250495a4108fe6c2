//! Task records

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::models::{NewTask, Task, TaskSource, TaskStatus, TaskUpdate};
use crate::{Error, Result};

const COLUMNS: &str =
    "id, company_id, title, description, category, priority, status, source, created_at, updated_at";

fn build(company_id: Uuid, new: NewTask, source: TaskSource) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        company_id,
        title: new.title.trim().to_string(),
        description: new.description,
        category: new
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "general".to_string()),
        priority: new.priority,
        status: TaskStatus::Todo,
        source,
        created_at: now,
        updated_at: now,
    }
}

async fn insert(tx: &mut Transaction<'_, Sqlite>, task: &Task) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tasks (id, company_id, title, description, category, priority, status, source, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.id)
    .bind(task.company_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.category)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.source)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn create(pool: &SqlitePool, company_id: Uuid, new: NewTask) -> Result<Task> {
    new.validate()?;
    let task = build(company_id, new, TaskSource::Manual);

    let mut tx = pool.begin().await?;
    insert(&mut tx, &task).await?;
    tx.commit().await?;

    Ok(task)
}

/// Insert analysis-generated tasks in one transaction
///
/// Entries with an empty title are skipped.
pub async fn create_generated(
    pool: &SqlitePool,
    company_id: Uuid,
    new_tasks: Vec<NewTask>,
) -> Result<Vec<Task>> {
    let mut tx = pool.begin().await?;
    let created = insert_generated(&mut tx, company_id, new_tasks).await?;
    tx.commit().await?;
    Ok(created)
}

/// Insert analysis-generated tasks into the caller's transaction
pub async fn insert_generated(
    tx: &mut Transaction<'_, Sqlite>,
    company_id: Uuid,
    new_tasks: Vec<NewTask>,
) -> Result<Vec<Task>> {
    let mut created = Vec::with_capacity(new_tasks.len());
    for new in new_tasks {
        if new.validate().is_err() {
            continue;
        }
        let task = build(company_id, new, TaskSource::Ai);
        insert(tx, &task).await?;
        created.push(task);
    }
    Ok(created)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Task> {
    sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Task not found: {}", id)))
}

pub async fn list_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE company_id = ? ORDER BY created_at",
        COLUMNS
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

pub async fn update(pool: &SqlitePool, id: Uuid, changes: TaskUpdate) -> Result<Task> {
    changes.validate()?;
    let mut task = get(pool, id).await?;

    if let Some(title) = changes.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = changes.description {
        task.description = description;
    }
    if let Some(category) = changes.category {
        task.category = category;
    }
    if let Some(priority) = changes.priority {
        task.priority = priority;
    }
    if let Some(status) = changes.status {
        task.status = status;
    }
    task.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, category = ?, priority = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.category)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.updated_at)
    .bind(task.id)
    .execute(pool)
    .await?;

    Ok(task)
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(Error::NotFound(format!("Task not found: {}", id)));
    }
    Ok(())
}
