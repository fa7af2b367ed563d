use crate::tracker::persist::{SnapshotRecord, SnapshotStore, StoreError};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

/// Create the snapshot table. Runs once at boot, before the tracker starts.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tracked_posts (
            message_id INTEGER PRIMARY KEY,
            channel_id INTEGER NOT NULL,
            label TEXT NOT NULL,
            items TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn db_err(err: impl std::fmt::Display) -> StoreError {
    StoreError(err.to_string())
}

/// SQLite-backed snapshot store. Every save replaces the whole table; the
/// snapshot is small (one row per tracked post) and this keeps deletions
/// from lingering.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load(&self) -> Result<Vec<SnapshotRecord>, StoreError> {
        let rows = sqlx::query("SELECT message_id, channel_id, label, items FROM tracked_posts")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let items: String = row.get("items");
            let items = match serde_json::from_str(&items) {
                Ok(items) => items,
                Err(err) => {
                    tracing::warn!("skipping unreadable snapshot row: {err}");
                    continue;
                }
            };
            records.push(SnapshotRecord {
                message_id: row.get::<i64, _>("message_id") as u64,
                channel_id: row.get::<i64, _>("channel_id") as u64,
                label: row.get("label"),
                items,
            });
        }
        Ok(records)
    }

    async fn save(&self, records: &[SnapshotRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM tracked_posts")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        for record in records {
            let items = serde_json::to_string(&record.items).map_err(db_err)?;
            sqlx::query(
                "INSERT INTO tracked_posts (message_id, channel_id, label, items) VALUES (?, ?, ?, ?)",
            )
            .bind(record.message_id as i64)
            .bind(record.channel_id as i64)
            .bind(&record.label)
            .bind(items)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }
}
