use crate::models::{MatchRecord, PairKey, PairScore, ScoreBreakdown};
use crate::services::store::{MatchStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::SqlxError(e) => match e {
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
                other => StoreError::InvalidData(other.to_string()),
            },
            PostgresError::MigrateError(e) => StoreError::Unavailable(e.to_string()),
            PostgresError::InvalidData(msg) => StoreError::InvalidData(msg),
        }
    }
}

const RECORD_COLUMNS: &str = "id, startup_id, talent_id, score, skill_points, industry_points, \
     stage_bonus, version, created_at, updated_at";

/// Convert a SMALLINT column into a bounded score component
fn small_to_points(value: i16, column: &str, max: u8) -> Result<u8, PostgresError> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .ok_or_else(|| PostgresError::InvalidData(format!("{} out of range: {}", column, value)))
}

fn record_from_row(row: &PgRow) -> Result<MatchRecord, PostgresError> {
    Ok(MatchRecord {
        id: row.try_get::<Uuid, _>("id")?,
        startup_id: row.try_get("startup_id")?,
        talent_id: row.try_get("talent_id")?,
        score: small_to_points(row.try_get("score")?, "score", 100)?,
        breakdown: ScoreBreakdown {
            skill_points: small_to_points(row.try_get("skill_points")?, "skill_points", 50)?,
            industry_points: small_to_points(row.try_get("industry_points")?, "industry_points", 30)?,
            stage_bonus: small_to_points(row.try_get("stage_bonus")?, "stage_bonus", 20)?,
        },
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed match store
///
/// The `(startup_id, talent_id)` unique index is the source of truth for
/// one-record-per-pair. Inserts that lose a race surface as
/// [`StoreError::Conflict`] and updates are conditional on `version`.
pub struct PostgresMatchStore {
    pool: PgPool,
}

impl PostgresMatchStore {
    /// Create a new PostgreSQL store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL match store");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Wrap an existing pool (migrations are the caller's concern)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PostgresMatchStore {
    async fn get(&self, key: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM match_records WHERE startup_id = $1 AND talent_id = $2",
            RECORD_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&key.startup_id)
            .bind(&key.talent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn insert(
        &self,
        pair: &PairScore,
        computed_at: DateTime<Utc>,
    ) -> Result<MatchRecord, StoreError> {
        let record = MatchRecord::from_pair(pair, computed_at);

        let query = r#"
            INSERT INTO match_records
                (id, startup_id, talent_id, score, skill_points, industry_points,
                 stage_bonus, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        "#;

        let result = sqlx::query(query)
            .bind(record.id)
            .bind(&record.startup_id)
            .bind(&record.talent_id)
            .bind(record.score as i16)
            .bind(record.breakdown.skill_points as i16)
            .bind(record.breakdown.industry_points as i16)
            .bind(record.breakdown.stage_bonus as i16)
            .bind(record.version)
            .bind(computed_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                tracing::debug!("Inserted match record {} (score {})", pair.key, pair.score);
                Ok(record)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict(pair.key.clone()))
            }
            Err(e) => Err(PostgresError::from(e).into()),
        }
    }

    async fn update_if_version(
        &self,
        pair: &PairScore,
        expected_version: i64,
        computed_at: DateTime<Utc>,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let query = format!(
            r#"
            UPDATE match_records SET
                score = $1,
                skill_points = $2,
                industry_points = $3,
                stage_bonus = $4,
                version = version + 1,
                updated_at = $5
            WHERE startup_id = $6 AND talent_id = $7 AND version = $8
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(pair.score as i16)
            .bind(pair.breakdown.skill_points as i16)
            .bind(pair.breakdown.industry_points as i16)
            .bind(pair.breakdown.stage_bonus as i16)
            .bind(computed_at)
            .bind(&pair.key.startup_id)
            .bind(&pair.key.talent_id)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn list_for_talent(&self, talent_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM match_records WHERE talent_id = $1 \
             ORDER BY score DESC, updated_at DESC, startup_id ASC",
            RECORD_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(talent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        tracing::debug!("Talent {} has {} match records", talent_id, rows.len());

        Ok(rows.iter().map(record_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_for_startups(&self, startup_ids: &[String]) -> Result<Vec<MatchRecord>, StoreError> {
        if startup_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {} FROM match_records WHERE startup_id = ANY($1) \
             ORDER BY score DESC, updated_at DESC, talent_id ASC",
            RECORD_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(startup_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(rows.iter().map(record_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| PostgresError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_to_points_bounds() {
        assert_eq!(small_to_points(50, "skill_points", 50).unwrap(), 50);
        assert!(small_to_points(51, "skill_points", 50).is_err());
        assert!(small_to_points(-1, "score", 100).is_err());
    }

    #[test]
    fn test_pool_errors_are_transient() {
        let err: StoreError = PostgresError::SqlxError(sqlx::Error::PoolTimedOut).into();
        assert!(err.is_transient());

        let err: StoreError = PostgresError::SqlxError(sqlx::Error::RowNotFound).into();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn test_insert_then_conflict() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresMatchStore::from_settings(&url, Some(2), Some(1), None, None)
            .await
            .expect("Failed to connect");

        let pair = PairScore {
            key: PairKey::new(Uuid::new_v4().to_string(), Uuid::new_v4().to_string()),
            score: 42,
            breakdown: ScoreBreakdown { skill_points: 25, industry_points: 15, stage_bonus: 2 },
        };
        let now = Utc::now();

        let created = store.insert(&pair, now).await.unwrap();
        assert_eq!(created.version, 1);

        let err = store.insert(&pair, now).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict(pair.key.clone()));

        let updated = store.update_if_version(&pair, 1, Utc::now()).await.unwrap().unwrap();
        assert_eq!(updated.version, 2);
        assert!(store.update_if_version(&pair, 1, Utc::now()).await.unwrap().is_none());
    }
}
