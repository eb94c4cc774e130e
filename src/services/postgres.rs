use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use crate::models::MatchResult;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// PostgreSQL store for delivered matches
///
/// Keeps track of which jobs a user has already been sent so the matching
/// route can exclude them from the candidate pool on the next run.
pub struct MatchStore {
    pool: PgPool,
}

impl MatchStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Record delivered matches
    ///
    /// Uses INSERT ... ON CONFLICT so re-delivering a job refreshes the
    /// score, method and timestamp instead of failing.
    pub async fn record_delivered(&self, results: &[MatchResult]) -> Result<u64, StoreError> {
        let query = r#"
            INSERT INTO delivered_matches (user_email, job_hash, match_score, match_reason, method, confidence, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_email, job_hash)
            DO UPDATE SET
                match_score = EXCLUDED.match_score,
                match_reason = EXCLUDED.match_reason,
                method = EXCLUDED.method,
                confidence = EXCLUDED.confidence,
                delivered_at = EXCLUDED.delivered_at
        "#;

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for result in results {
            if result.user_email.trim().is_empty() {
                return Err(StoreError::InvalidInput(format!(
                    "match for job {} has no user email",
                    result.job_hash
                )));
            }

            written += sqlx::query(query)
                .bind(&result.user_email)
                .bind(&result.job_hash)
                .bind(result.match_score)
                .bind(&result.match_reason)
                .bind(result.method.to_string())
                .bind(result.confidence)
                .bind(result.matched_at)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(count = written, "Recorded delivered matches");
        Ok(written)
    }

    /// Job hashes already delivered to a user
    pub async fn sent_job_hashes(&self, user_email: &str) -> Result<Vec<String>, StoreError> {
        let query = r#"
            SELECT job_hash
            FROM delivered_matches
            WHERE user_email = $1
            ORDER BY delivered_at DESC
        "#;

        let rows = sqlx::query(query).bind(user_email).fetch_all(&self.pool).await?;
        let hashes: Vec<String> = rows.iter().map(|row| row.get("job_hash")).collect();

        tracing::debug!(user = %user_email, count = hashes.len(), "Loaded sent job hashes");
        Ok(hashes)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
