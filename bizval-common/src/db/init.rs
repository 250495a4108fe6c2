//! Database initialization
//!
//! Creates the database file on first run, applies the schema idempotently
//! and seeds default settings. Both bizval-fn and bizval-worker call
//! [`init_database`] at startup; whichever starts first creates the schema.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Default runtime settings written on first start
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("worker_poll_interval_ms", "2000"),
    ("worker_visibility_timeout_secs", "300"),
    ("worker_max_attempts", "3"),
    ("worker_batch_size", "5"),
    ("llm_requests_per_minute", "30"),
    ("http_max_body_size_bytes", "1048576"),
];

/// Open (creating if needed) the database and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    // WAL lets the worker write while the function server reads
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Apply every CREATE TABLE / CREATE INDEX statement (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        token_hash TEXT UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id BLOB PRIMARY KEY,
        owner_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL CHECK (length(trim(name)) > 0),
        business_id TEXT,
        industry TEXT,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_companies_owner ON companies(owner_id)",
    r#"
    CREATE TABLE IF NOT EXISTS valuations (
        id BLOB PRIMARY KEY,
        company_id BLOB NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        revenue REAL NOT NULL DEFAULT 0,
        ebitda REAL NOT NULL DEFAULT 0,
        net_income REAL NOT NULL DEFAULT 0,
        book_equity REAL NOT NULL DEFAULT 0,
        net_debt REAL NOT NULL DEFAULT 0,
        revenue_multiple REAL NOT NULL DEFAULT 0,
        ebitda_multiple REAL NOT NULL DEFAULT 0,
        pe_multiple REAL NOT NULL DEFAULT 0,
        equity_value REAL,
        dcf_result TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_valuations_company ON valuations(company_id)",
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id BLOB PRIMARY KEY,
        company_id BLOB NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        title TEXT NOT NULL CHECK (length(trim(title)) > 0),
        description TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT 'general',
        priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high')),
        status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'in_progress', 'done')),
        source TEXT NOT NULL DEFAULT 'manual' CHECK (source IN ('manual', 'ai')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_company ON tasks(company_id)",
    r#"
    CREATE TABLE IF NOT EXISTS nda_documents (
        id BLOB PRIMARY KEY,
        company_id BLOB NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        recipient_name TEXT NOT NULL,
        recipient_email TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'sent', 'signed', 'revoked')),
        content TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        signed_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_nda_documents_company ON nda_documents(company_id)",
    r#"
    CREATE TABLE IF NOT EXISTS assessments (
        id BLOB PRIMARY KEY,
        company_id BLOB NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        valuation_id BLOB REFERENCES valuations(id) ON DELETE SET NULL,
        kind TEXT NOT NULL,
        score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
        summary TEXT NOT NULL DEFAULT '',
        details TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_assessments_company ON assessments(company_id)",
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id BLOB PRIMARY KEY,
        company_id BLOB NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        title TEXT NOT NULL DEFAULT '',
        messages TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analysis_status (
        id BLOB PRIMARY KEY,
        kind TEXT NOT NULL,
        company_id BLOB NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        valuation_id BLOB,
        requested_by BLOB NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('processing', 'completed', 'failed')),
        queue_message_id INTEGER,
        result TEXT,
        error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_analysis_status_company ON analysis_status(company_id)",
    r#"
    CREATE TABLE IF NOT EXISTS queue_messages (
        msg_id INTEGER PRIMARY KEY AUTOINCREMENT,
        queue_name TEXT NOT NULL,
        message TEXT NOT NULL,
        enqueued_at_ms INTEGER NOT NULL,
        vt_ms INTEGER NOT NULL,
        read_ct INTEGER NOT NULL DEFAULT 0,
        archived_at_ms INTEGER
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_queue_messages_visible ON queue_messages(queue_name, archived_at_ms, vt_ms)",
];

/// Ensure all default settings exist [`DEFAULT_SETTINGS`]
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// Missing settings are created; NULL values are reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            // INSERT OR IGNORE: both binaries may initialize concurrently
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some((None,)) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some((Some(_),)) => {}
    }

    Ok(())
}
