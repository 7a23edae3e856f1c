//! PostgreSQL sink.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::error::{SinkError, SinkResult};
use crate::traits::sink::JobSink;
use crate::types::job::Job;

/// PostgreSQL-backed job table keyed by `(source, id)`.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect and create the `jobs` table if needed.
    pub async fn new(database_url: &str) -> SinkResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(database_error)?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool.
    pub async fn from_pool(pool: PgPool) -> SinkResult<Self> {
        let sink = Self { pool };
        sink.run_migrations().await?;
        Ok(sink)
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
                salary_lower BIGINT,
                salary_upper BIGINT,
                summary TEXT NOT NULL,
                description TEXT NOT NULL,
                url TEXT NOT NULL,
                fit INTEGER,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (source, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }
}

#[async_trait]
impl JobSink for PostgresSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn write(&self, job: &Job) -> SinkResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, source, title, company, location, date, salary,
                              salary_lower, salary_upper, summary, description, url, fit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
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
