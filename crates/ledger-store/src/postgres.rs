use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CommitOutcome, CommitWrite, EntityKey, EntityRecord, ReservationRecord, Result, StoreError,
    TransactionId, Version, store::LedgerStore,
};

/// PostgreSQL-backed ledger store.
///
/// Several ledgers may share one database; rows are partitioned by the
/// `ledger` column of the `entities` and `reservations` tables.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    ledger: Arc<str>,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store bound to a ledger namespace.
    pub fn new(pool: PgPool, ledger: impl Into<String>) -> Self {
        Self {
            pool,
            ledger: Arc::from(ledger.into()),
        }
    }

    /// Opens a connection pool for ledger stores sharing one database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(pool)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_entity(row: PgRow) -> Result<EntityRecord> {
        Ok(EntityRecord {
            key: EntityKey::new(row.try_get::<String, _>("key")?),
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
            payload: row.try_get("payload")?,
        })
    }

    fn row_to_reservation(row: PgRow) -> Result<ReservationRecord> {
        Ok(ReservationRecord {
            transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
            entity_key: EntityKey::new(row.try_get::<String, _>("entity_key")?),
            created_at: row.try_get("created_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    fn ledger(&self) -> &str {
        &self.ledger
    }

    async fn insert_entity(&self, key: EntityKey, payload: serde_json::Value) -> Result<Version> {
        sqlx::query(
            r#"
            INSERT INTO entities (ledger, key, version, updated_at, payload)
            VALUES ($1, $2, $3, NOW(), $4)
            "#,
        )
        .bind(self.ledger.as_ref())
        .bind(key.as_str())
        .bind(Version::first().as_i64())
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::AlreadyExists {
                    ledger: self.ledger.to_string(),
                    key: key.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(Version::first())
    }

    async fn get_entity(&self, key: &EntityKey) -> Result<Option<EntityRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT key, version, updated_at, payload
            FROM entities
            WHERE ledger = $1 AND key = $2
            "#,
        )
        .bind(self.ledger.as_ref())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entity).transpose()
    }

    async fn list_entities(&self) -> Result<Vec<EntityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT key, version, updated_at, payload
            FROM entities
            WHERE ledger = $1
            ORDER BY key ASC
            "#,
        )
        .bind(self.ledger.as_ref())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entity).collect()
    }

    async fn put_reservation(&self, record: ReservationRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (ledger, transaction_id, entity_key, created_at, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (ledger, transaction_id) DO UPDATE SET
                entity_key = EXCLUDED.entity_key,
                created_at = EXCLUDED.created_at,
                payload = EXCLUDED.payload
            "#,
        )
        .bind(self.ledger.as_ref())
        .bind(record.transaction_id.as_uuid())
        .bind(record.entity_key.as_str())
        .bind(record.created_at)
        .bind(&record.payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_reservation(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<ReservationRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT transaction_id, entity_key, created_at, payload
            FROM reservations
            WHERE ledger = $1 AND transaction_id = $2
            "#,
        )
        .bind(self.ledger.as_ref())
        .bind(transaction_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_reservation).transpose()
    }

    async fn list_reservations(&self) -> Result<Vec<ReservationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT transaction_id, entity_key, created_at, payload
            FROM reservations
            WHERE ledger = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(self.ledger.as_ref())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_reservation).collect()
    }

    async fn delete_reservation(&self, transaction_id: TransactionId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM reservations WHERE ledger = $1 AND transaction_id = $2")
                .bind(self.ledger.as_ref())
                .bind(transaction_id.as_uuid())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_commit(&self, write: CommitWrite) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        // Removing the reservation first row-locks it, serializing concurrent
        // commits of the same transaction id.
        let removed =
            sqlx::query("DELETE FROM reservations WHERE ledger = $1 AND transaction_id = $2")
                .bind(self.ledger.as_ref())
                .bind(write.transaction_id.as_uuid())
                .execute(&mut *tx)
                .await?
                .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::ReservationMissing);
        }

        let updated = sqlx::query(
            r#"
            UPDATE entities
            SET payload = $3, version = version + 1, updated_at = NOW()
            WHERE ledger = $1 AND key = $2 AND version = $4
            "#,
        )
        .bind(self.ledger.as_ref())
        .bind(write.key.as_str())
        .bind(&write.payload)
        .bind(write.expected_version.as_i64())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM entities WHERE ledger = $1 AND key = $2")
                    .bind(self.ledger.as_ref())
                    .bind(write.key.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            metrics::counter!("ledger_store_conflicts_total", "ledger" => self.ledger.to_string())
                .increment(1);
            tracing::debug!(
                ledger = %self.ledger,
                key = %write.key,
                expected = %write.expected_version,
                "entity version moved during commit"
            );
            return Err(StoreError::ConcurrencyConflict {
                ledger: self.ledger.to_string(),
                key: write.key,
                expected: write.expected_version,
                actual: Version::new(actual.unwrap_or(0)),
            });
        }

        tx.commit().await?;
        Ok(CommitOutcome::Applied(write.expected_version.next()))
    }

    async fn clear_reservations(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM reservations WHERE ledger = $1")
            .bind(self.ledger.as_ref())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}
