use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{QuestionId, TopicId};

/// The option list must offer a real choice.
pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("a question needs at least {MIN_OPTIONS} options, got {got}")]
    TooFewOptions { got: usize },

    #[error("correct option index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

/// A single multiple-choice question, immutable for the lifetime of a session.
///
/// The option list and correct index come from the external question store
/// and are never mutated here; validation happens once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    topic_id: TopicId,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: Option<String>,
    tags: Vec<String>,
    difficulty: Option<String>,
}

impl Question {
    /// Build a question, validating the option list and correct index.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::TooFewOptions` for fewer than two options and
    /// `QuestionError::CorrectIndexOutOfRange` when the correct index does
    /// not address an option.
    pub fn new(
        id: QuestionId,
        topic_id: TopicId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
    ) -> Result<Self, QuestionError> {
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions { got: options.len() });
        }
        if correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
                len: options.len(),
            });
        }

        Ok(Self {
            id,
            topic_id,
            prompt: prompt.into(),
            options,
            correct_index,
            explanation: None,
            tags: Vec::new(),
            difficulty: None,
        })
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    /// Whether the given option index answers this question correctly.
    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn question_rejects_single_option() {
        let err = Question::new(
            QuestionId::new("q1"),
            TopicId::new("t1"),
            "prompt",
            options(1),
            0,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions { got: 1 });
    }

    #[test]
    fn question_rejects_out_of_range_correct_index() {
        let err = Question::new(
            QuestionId::new("q1"),
            TopicId::new("t1"),
            "prompt",
            options(4),
            4,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::CorrectIndexOutOfRange { index: 4, len: 4 });
    }

    #[test]
    fn question_checks_correctness_by_index() {
        let question = Question::new(
            QuestionId::new("q1"),
            TopicId::new("t1"),
            "prompt",
            options(4),
            2,
        )
        .unwrap();
        assert!(question.is_correct(2));
        assert!(!question.is_correct(0));
    }

    #[test]
    fn builder_attaches_optional_fields() {
        let question = Question::new(
            QuestionId::new("q1"),
            TopicId::new("t1"),
            "prompt",
            options(2),
            0,
        )
        .unwrap()
        .with_explanation("because")
        .with_tags(vec!["cardio".into()])
        .with_difficulty("hard");

        assert_eq!(question.explanation(), Some("because"));
        assert_eq!(question.tags(), ["cardio".to_string()]);
        assert_eq!(question.difficulty(), Some("hard"));
    }
}
