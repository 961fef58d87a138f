use rand::rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{Question, QuestionId, SessionMode, TopicId, UserId};
use storage::repository::QuestionSource;

use crate::error::ProviderError;

/// Fixed session size for capped modes. Exposed as a provider parameter,
/// not a hidden constant; practice mode ignores it.
pub const DEFAULT_SESSION_SIZE: usize = 50;

/// An ordered, immutable question set ready to back a session.
#[derive(Debug, Clone)]
pub struct AcquiredSet {
    questions: Vec<Question>,
    missing: Vec<QuestionId>,
}

impl AcquiredSet {
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The ordered id list that reconstructs exactly this set later.
    #[must_use]
    pub fn retest_keys(&self) -> Vec<QuestionId> {
        self.questions.iter().map(|q| q.id().clone()).collect()
    }

    /// Retest keys that could not be resolved to a question. Always empty
    /// for fresh acquisitions.
    #[must_use]
    pub fn missing(&self) -> &[QuestionId] {
        &self.missing
    }
}

/// Obtains the question set for a session: freshly filtered by topic
/// selection, or reconstructed from a saved key list for a retest.
#[derive(Clone)]
pub struct QuestionSetProvider {
    source: Arc<dyn QuestionSource>,
    cap: usize,
}

impl QuestionSetProvider {
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self {
            source,
            cap: DEFAULT_SESSION_SIZE,
        }
    }

    /// Override the session size cap for capped modes.
    #[must_use]
    pub fn with_session_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    /// Acquire a fresh set for the user's topic selection.
    ///
    /// The pool is uniformly shuffled; every mode except practice is then
    /// capped to the session size. The resulting order is the retest key
    /// list for modes that save one.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Fetch` on source failures and
    /// `ProviderError::Empty` when nothing matched the selection.
    pub async fn acquire(
        &self,
        mode: SessionMode,
        user: &UserId,
        topics: &[TopicId],
    ) -> Result<AcquiredSet, ProviderError> {
        let mut pool = self.source.questions_by_topics(user, topics).await?;
        if pool.is_empty() {
            return Err(ProviderError::Empty);
        }

        pool.shuffle(&mut rng());
        if mode.caps_pool() {
            pool.truncate(self.cap);
        }

        Ok(AcquiredSet {
            questions: pool,
            missing: Vec::new(),
        })
    }

    /// Reconstruct a previously taken set from its saved key list.
    ///
    /// The source's response order is not trusted: results are re-sorted to
    /// match the key order exactly. Keys with no matching question are
    /// tolerated; the session proceeds with the subset found and the loss
    /// is reported on the set and logged.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Fetch` on source failures and
    /// `ProviderError::Empty` when no key resolved (or the list was empty).
    pub async fn acquire_retest(&self, keys: &[QuestionId]) -> Result<AcquiredSet, ProviderError> {
        if keys.is_empty() {
            return Err(ProviderError::Empty);
        }

        let fetched = self.source.questions_by_ids(keys).await?;
        let mut by_id: HashMap<QuestionId, Question> = fetched
            .into_iter()
            .map(|q| (q.id().clone(), q))
            .collect();

        let mut questions = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for key in keys {
            match by_id.remove(key) {
                Some(question) => questions.push(question),
                None => missing.push(key.clone()),
            }
        }

        if questions.is_empty() {
            return Err(ProviderError::Empty);
        }
        if !missing.is_empty() {
            log::warn!(
                "retest reconstruction resolved {} of {} saved questions",
                questions.len(),
                keys.len()
            );
        }

        Ok(AcquiredSet { questions, missing })
    }
}
