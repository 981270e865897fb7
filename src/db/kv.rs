use chrono::Utc;
use futures::future::BoxFuture;
use linkcal_core::{KeyValueError, KeyValueStore};
use sqlx::SqlitePool;

/// Host-local key-value storage in the CLI's SQLite database.
pub struct SqliteKeyValue {
    pool: SqlitePool,
}

impl SqliteKeyValue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn read(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKeyValue {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, KeyValueError>> {
        Box::pin(async move {
            self.read(key)
                .await
                .map_err(|e| KeyValueError::Backend(e.to_string()))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), KeyValueError>> {
        Box::pin(async move {
            self.write(key, &value)
                .await
                .map_err(|e| KeyValueError::Backend(e.to_string()))
        })
    }
}
