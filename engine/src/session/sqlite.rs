//! SQLite session persistence
//!
//! Backs the session store with a SQLite database in WAL mode, plus a run
//! history table for the `history` command. Migrations are embedded and
//! idempotent.

use super::{Session, SessionBackend, SessionCorruptionError, ToneProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Row};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Database connection pool
pub struct SessionDatabase {
    pool: SqlitePool,
}

impl SessionDatabase {
    /// Open (or create) the database at the given path.
    ///
    /// Enables WAL mode for concurrent readers and runs migrations. WAL
    /// recovery after an unclean shutdown is handled by SQLite itself on
    /// reconnect.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_initial.sql")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a session backend over this database
    pub fn sessions(&self) -> SqliteSessionBackend {
        SqliteSessionBackend::new(self.pool.clone())
    }

    /// Create a run history repository over this database
    pub fn runs(&self) -> RunRepository {
        RunRepository::new(self.pool.clone())
    }

    /// Checkpoint the WAL and close all connections; call on shutdown
    pub async fn close(self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;
        self.pool.close().await;
        Ok(())
    }
}

/// Session persistence over SQLite
pub struct SqliteSessionBackend {
    pool: SqlitePool,
}

impl SqliteSessionBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionBackend for SqliteSessionBackend {
    async fn fetch(
        &self,
        session_id: &str,
    ) -> std::result::Result<Option<Session>, SessionCorruptionError> {
        let row = sqlx::query("SELECT tone, history, turn_count FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionCorruptionError::Unreadable(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tone: Option<String> = row
            .try_get("tone")
            .map_err(|e| SessionCorruptionError::Corrupted(e.to_string()))?;
        let history_json: String = row
            .try_get("history")
            .map_err(|e| SessionCorruptionError::Corrupted(e.to_string()))?;
        let turn_count: i64 = row
            .try_get("turn_count")
            .map_err(|e| SessionCorruptionError::Corrupted(e.to_string()))?;

        let tone = tone
            .map(|t| {
                t.parse::<ToneProfile>()
                    .map_err(SessionCorruptionError::Corrupted)
            })
            .transpose()?;

        let history = serde_json::from_str(&history_json)
            .map_err(|e| SessionCorruptionError::Corrupted(e.to_string()))?;

        Ok(Some(Session {
            id: session_id.to_string(),
            tone,
            history,
            turn_count: turn_count as u64,
        }))
    }

    async fn store(&self, session: &Session) -> std::result::Result<(), SessionCorruptionError> {
        let history_json = serde_json::to_string(&session.history)
            .map_err(|e| SessionCorruptionError::Corrupted(e.to_string()))?;
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO sessions (id, tone, history, turn_count, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             tone = excluded.tone, history = excluded.history, \
             turn_count = excluded.turn_count, updated_at = excluded.updated_at",
        )
        .bind(&session.id)
        .bind(session.tone.map(|t| t.as_str().to_string()))
        .bind(history_json)
        .bind(session.turn_count as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionCorruptionError::Unwritable(e.to_string()))?;

        Ok(())
    }
}

/// One completed orchestration run, recorded for the history view
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub session_id: String,
    pub instruction: String,
    pub status: String,
    pub subtask_count: i64,
    pub duration_ms: i64,
    pub created_at: i64,
}

/// Run history repository
pub struct RunRepository {
    pool: SqlitePool,
}

impl RunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a completed run
    pub async fn record(
        &self,
        id: &str,
        session_id: &str,
        instruction: &str,
        status: &str,
        subtask_count: usize,
        duration_ms: i64,
    ) -> Result<()> {
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO runs (id, session_id, instruction, status, subtask_count, duration_ms, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(session_id)
        .bind(instruction)
        .bind(status)
        .bind(subtask_count as i64)
        .bind(duration_ms)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to record run")?;

        Ok(())
    }

    /// Most recent runs, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT id, session_id, instruction, status, subtask_count, duration_ms, created_at \
             FROM runs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch run history")?;

        rows.into_iter()
            .map(|row| {
                Ok(RunRecord {
                    id: row.try_get("id")?,
                    session_id: row.try_get("session_id")?,
                    instruction: row.try_get("instruction")?,
                    status: row.try_get("status")?,
                    subtask_count: row.try_get("subtask_count")?,
                    duration_ms: row.try_get("duration_ms")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
