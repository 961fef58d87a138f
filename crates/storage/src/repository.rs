use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{Question, QuestionError, QuestionId, TopicId, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a question.
///
/// This mirrors the domain `Question` so adapters can serialize and
/// deserialize without leaking storage concerns into the domain layer;
/// `into_question` re-runs domain validation on the way back.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub topic_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: Option<String>,
    pub tags: Vec<String>,
    pub difficulty: Option<String>,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question.id().as_str().to_owned(),
            topic_id: question.topic_id().as_str().to_owned(),
            prompt: question.prompt().to_owned(),
            options: question.options().to_vec(),
            correct_index: question.correct_index(),
            explanation: question.explanation().map(str::to_owned),
            tags: question.tags().to_vec(),
            difficulty: question.difficulty().map(str::to_owned),
        }
    }

    /// Convert the record back into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the persisted option list or correct
    /// index fail validation.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let mut question = Question::new(
            QuestionId::new(self.id),
            TopicId::new(self.topic_id),
            self.prompt,
            self.options,
            self.correct_index,
        )?
        .with_tags(self.tags);
        if let Some(explanation) = self.explanation {
            question = question.with_explanation(explanation);
        }
        if let Some(difficulty) = self.difficulty {
            question = question.with_difficulty(difficulty);
        }
        Ok(question)
    }
}

/// Read-only access to the external question store.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the pool of questions eligible for the user under the selected
    /// topics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn questions_by_topics(
        &self,
        user: &UserId,
        topics: &[TopicId],
    ) -> Result<Vec<Question>, StorageError>;

    /// Fetch questions by id for retest reconstruction. Ids with no match
    /// are simply absent from the result; response order is NOT guaranteed
    /// to follow the input order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;
}

/// Client-local persistence for the retest key list. A single list is
/// retained; every save overwrites the previous one wholesale.
#[async_trait]
pub trait RetestKeyRepository: Send + Sync {
    /// Overwrite the stored key list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the list cannot be persisted.
    async fn save_keys(&self, keys: &[QuestionId]) -> Result<(), StorageError>;

    /// Load the stored key list; empty when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn load_keys(&self) -> Result<Vec<QuestionId>, StorageError>;
}

/// Best-effort progress counters updated per submitted answer.
///
/// `record_solved` is expected to be idempotent per (user, question).
/// Deduplicating retried `increment_topic_attempt` calls cannot be fully
/// discharged on the client; the collaborator behind this trait owns that.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Persist the solved-question record for one submitted answer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn record_solved(
        &self,
        user: &UserId,
        question: &QuestionId,
        correct: bool,
    ) -> Result<(), StorageError>;

    /// Increment the user's attempted-question counter for a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be updated.
    async fn increment_topic_attempt(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<Vec<Question>>>,
    retest_keys: Arc<Mutex<Vec<QuestionId>>>,
    solved: Arc<Mutex<HashMap<(UserId, QuestionId), bool>>>,
    attempts: Arc<Mutex<HashMap<(UserId, TopicId), u64>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a question into the store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_question(&self, question: Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(question);
        Ok(())
    }

    /// Recorded correctness for a solved question, if any. Test aid.
    #[must_use]
    pub fn solved(&self, user: &UserId, question: &QuestionId) -> Option<bool> {
        self.solved
            .lock()
            .ok()?
            .get(&(user.clone(), question.clone()))
            .copied()
    }

    /// Current attempted-question counter for a topic. Test aid.
    #[must_use]
    pub fn attempt_count(&self, user: &UserId, topic: &TopicId) -> u64 {
        self.attempts
            .lock()
            .map(|guard| {
                guard
                    .get(&(user.clone(), topic.clone()))
                    .copied()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn questions_by_topics(
        &self,
        _user: &UserId,
        topics: &[TopicId],
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|q| topics.contains(q.topic_id()))
            .cloned()
            .collect())
    }

    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        // Deliberately in store order, not input order, mirroring the real
        // collaborator whose response order is untrusted.
        Ok(guard
            .iter()
            .filter(|q| ids.contains(q.id()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RetestKeyRepository for InMemoryRepository {
    async fn save_keys(&self, keys: &[QuestionId]) -> Result<(), StorageError> {
        let mut guard = self
            .retest_keys
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = keys.to_vec();
        Ok(())
    }

    async fn load_keys(&self) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self
            .retest_keys
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn record_solved(
        &self,
        user: &UserId,
        question: &QuestionId,
        correct: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .solved
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((user.clone(), question.clone()), correct);
        Ok(())
    }

    async fn increment_topic_attempt(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard.entry((user.clone(), topic.clone())).or_insert(0) += 1;
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub retest_keys: Arc<dyn RetestKeyRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionSource> = Arc::new(repo.clone());
        let retest_keys: Arc<dyn RetestKeyRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            questions,
            retest_keys,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_question(id: &str, topic: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            TopicId::new(topic),
            format!("prompt {id}"),
            vec!["a".into(), "b".into()],
            0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn filters_questions_by_topic() {
        let repo = InMemoryRepository::new();
        repo.insert_question(build_question("q1", "anatomy")).unwrap();
        repo.insert_question(build_question("q2", "physiology"))
            .unwrap();

        let user = UserId::new("u1");
        let pool = repo
            .questions_by_topics(&user, &[TopicId::new("anatomy")])
            .await
            .unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id(), &QuestionId::new("q1"));
    }

    #[tokio::test]
    async fn by_ids_omits_missing_questions() {
        let repo = InMemoryRepository::new();
        repo.insert_question(build_question("q1", "anatomy")).unwrap();

        let found = repo
            .questions_by_ids(&[QuestionId::new("q1"), QuestionId::new("gone")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn retest_keys_overwrite_wholesale() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_keys().await.unwrap().is_empty());

        repo.save_keys(&[QuestionId::new("q1"), QuestionId::new("q2")])
            .await
            .unwrap();
        repo.save_keys(&[QuestionId::new("q3")]).await.unwrap();

        assert_eq!(repo.load_keys().await.unwrap(), [QuestionId::new("q3")]);
    }

    #[tokio::test]
    async fn progress_counters_accumulate() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("u1");
        let topic = TopicId::new("anatomy");

        repo.record_solved(&user, &QuestionId::new("q1"), true)
            .await
            .unwrap();
        repo.increment_topic_attempt(&user, &topic).await.unwrap();
        repo.increment_topic_attempt(&user, &topic).await.unwrap();

        assert_eq!(repo.solved(&user, &QuestionId::new("q1")), Some(true));
        assert_eq!(repo.attempt_count(&user, &topic), 2);
    }

    #[test]
    fn question_record_round_trips() {
        let question = build_question("q1", "anatomy").with_explanation("because");
        let record = QuestionRecord::from_question(&question);
        let restored = record.into_question().unwrap();
        assert_eq!(restored, question);
    }
}
