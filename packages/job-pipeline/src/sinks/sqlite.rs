//! SQLite sink.
//!
//! Rows are keyed by `(source, id)`. Inserting a key that already exists
//! trips the primary key and is reported as success.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::error::{SinkError, SinkResult};
use crate::traits::sink::JobSink;
use crate::types::job::Job;

/// SQLite-backed job table.
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Connect and create the `jobs` table if needed.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://jobs.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> SinkResult<Self> {
        // In-memory databases are per connection
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(database_error)?;

        let sink = Self { pool };
        sink.run_migrations().await?;
        Ok(sink)
    }

    /// In-memory database (for testing).
    pub async fn in_memory() -> SinkResult<Self> {
        Self::new("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> SinkResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT NOT NULL,
                source TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                date TEXT NOT NULL,
                salary TEXT NOT NULL,
                salary_lower INTEGER,
                salary_upper INTEGER,
                summary TEXT NOT NULL,
                description TEXT NOT NULL,
                url TEXT NOT NULL,
                fit INTEGER,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (source, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    /// Number of stored jobs.
    pub async fn count(&self) -> SinkResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(database_error)?;
        Ok(count)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl JobSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write(&self, job: &Job) -> SinkResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, source, title, company, location, date, salary,
                              salary_lower, salary_upper, summary, description, url, fit)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.source)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.date)
        .bind(&job.salary)
        .bind(job.salary_lower)
        .bind(job.salary_upper)
        .bind(&job.summary)
        .bind(&job.description)
        .bind(&job.url)
        .bind(job.fit)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!(key = %job.key(), "Job already stored");
                Ok(())
            }
            Err(e) => Err(database_error(e)),
        }
    }
}

fn database_error(error: sqlx::Error) -> SinkError {
    SinkError::Database(Box::new(error))
}
