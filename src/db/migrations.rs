//! Journal database bootstrap: directory, connection pool, pragmas and the
//! instruments / aliases / trades schema.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info};

const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if needed) the journal database at `db_path` and bring
/// its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .after_connect(|conn, _meta| Box::pin(async move { configure_connection(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    let statements = run_migrations(&pool).await?;
    info!(path = %db_path, statements, "Journal database ready");
    Ok(pool)
}

/// Apply `schema.sql` and return the number of statements run. Every
/// statement is `IF NOT EXISTS`, so reruns are no-ops.
async fn run_migrations(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let statements: Vec<&str> = include_str!("schema.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = statements.len(), "Journal schema applied");
    Ok(statements.len())
}

/// Per-connection pragmas. Aliases reference instruments, so foreign keys
/// must be on for every pooled connection.
async fn configure_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // Reports the mode actually in effect; WAL can be refused.
    let (journal_mode,): (String,) = sqlx::query_as("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    debug!(journal_mode = %journal_mode, "Journal connection configured");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
