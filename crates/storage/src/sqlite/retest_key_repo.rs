use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{RetestKeyRepository, StorageError};
use quiz_core::model::QuestionId;

use super::SqliteRepository;

#[async_trait]
impl RetestKeyRepository for SqliteRepository {
    async fn save_keys(&self, keys: &[QuestionId]) -> Result<(), StorageError> {
        let ids: Vec<&str> = keys.iter().map(QuestionId::as_str).collect();
        let payload = serde_json::to_string(&ids)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO retest_keys (id, question_ids, saved_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                question_ids = excluded.question_ids,
                saved_at = excluded.saved_at
            ",
        )
        .bind(&payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn load_keys(&self) -> Result<Vec<QuestionId>, StorageError> {
        let row = sqlx::query("SELECT question_ids FROM retest_keys WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };

        let payload: String = row
            .try_get("question_ids")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let ids: Vec<String> = serde_json::from_str(&payload)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        Ok(ids.into_iter().map(QuestionId::new).collect())
    }
}
