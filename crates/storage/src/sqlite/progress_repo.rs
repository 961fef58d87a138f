use async_trait::async_trait;
use chrono::Utc;

use crate::repository::{ProgressRepository, StorageError};
use quiz_core::model::{QuestionId, TopicId, UserId};

use super::SqliteRepository;

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn record_solved(
        &self,
        user: &UserId,
        question: &QuestionId,
        correct: bool,
    ) -> Result<(), StorageError> {
        // Keyed by (user, question), so retrying a failed record cannot
        // create duplicates.
        sqlx::query(
            r"
            INSERT INTO solved_questions (user_id, question_id, is_correct, solved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, question_id) DO UPDATE SET
                is_correct = excluded.is_correct,
                solved_at = excluded.solved_at
            ",
        )
        .bind(user.as_str())
        .bind(question.as_str())
        .bind(i64::from(correct))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn increment_topic_attempt(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topic_attempts (user_id, topic_id, attempted)
            VALUES (?1, ?2, 1)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                attempted = attempted + 1
            ",
        )
        .bind(user.as_str())
        .bind(topic.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
