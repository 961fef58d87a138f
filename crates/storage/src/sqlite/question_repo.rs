use async_trait::async_trait;

use crate::repository::{QuestionRecord, QuestionSource, StorageError};
use quiz_core::model::{Question, QuestionId, TopicId, UserId};

use super::SqliteRepository;
use super::mapping::question_from_row;

const SELECT_COLUMNS: &str =
    "id, topic_id, prompt, options, correct_index, explanation, tags, difficulty";

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SqliteRepository {
    /// Insert or replace a question in the local cache.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    pub async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let record = QuestionRecord::from_question(question);
        let options = serde_json::to_string(&record.options)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let tags = serde_json::to_string(&record.tags)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, topic_id, prompt, options, correct_index, explanation, tags, difficulty
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                topic_id = excluded.topic_id,
                prompt = excluded.prompt,
                options = excluded.options,
                correct_index = excluded.correct_index,
                explanation = excluded.explanation,
                tags = excluded.tags,
                difficulty = excluded.difficulty
            ",
        )
        .bind(&record.id)
        .bind(&record.topic_id)
        .bind(&record.prompt)
        .bind(&options)
        .bind(i64::try_from(record.correct_index).unwrap_or(i64::MAX))
        .bind(&record.explanation)
        .bind(&tags)
        .bind(&record.difficulty)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl QuestionSource for SqliteRepository {
    async fn questions_by_topics(
        &self,
        _user: &UserId,
        topics: &[TopicId],
    ) -> Result<Vec<Question>, StorageError> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM questions WHERE topic_id IN ({}) ORDER BY id",
            placeholders(topics.len())
        );
        let mut query = sqlx::query(&sql);
        for topic in topics {
            query = query.bind(topic.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        rows.iter().map(question_from_row).collect()
    }

    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Result order follows the table, not the input: callers that care
        // about order re-sort against their key list.
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM questions WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        rows.iter().map(question_from_row).collect()
    }
}
