use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::progress::{PaletteSlot, QuestionStatus, SessionProgress};
use crate::model::{Question, QuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,

    #[error("session already completed")]
    Completed,

    #[error("submit called with no option selected")]
    NoSelection,

    #[error("submit called on an already submitted question")]
    DoubleSubmit,

    #[error("question already submitted, selection is frozen")]
    AlreadySubmitted,

    #[error("option index {index} is out of range for {len} options")]
    OptionOutOfRange { index: usize, len: usize },

    #[error("position {index} is out of range for {len} questions")]
    PositionOutOfRange { index: usize, len: usize },
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// How a session is taken. The mode decides pool capping, clock shape,
/// retest key capture and the auto-completion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Practice,
    Timed,
    Untimed,
    Retest,
}

impl SessionMode {
    /// Practice iterates over the whole filtered pool; every other mode is
    /// capped to the fixed session size.
    #[must_use]
    pub fn caps_pool(self) -> bool {
        !matches!(self, Self::Practice)
    }

    /// Only timed and untimed sessions capture a retest key list. Practice
    /// never qualifies, and retest never overwrites its own source.
    #[must_use]
    pub fn saves_retest_keys(self) -> bool {
        matches!(self, Self::Timed | Self::Untimed)
    }

    /// Practice completes on its own when navigation moves past the last
    /// question; other modes wait for an explicit end or clock expiry.
    #[must_use]
    pub fn auto_completes_on_overrun(self) -> bool {
        matches!(self, Self::Practice)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Practice => "practice",
            Self::Timed => "timed",
            Self::Untimed => "untimed",
            Self::Retest => "retest",
        };
        write!(f, "{name}")
    }
}

//
// ─── PER-QUESTION STATE ────────────────────────────────────────────────────────
//

/// Mutable per-question state, index-aligned with the session's question
/// list. Transitions one way only: unanswered → answered → submitted.
/// The review mark toggles independently and is never cleared implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionState {
    selected: Option<usize>,
    submitted: bool,
    correct: Option<bool>,
    marked_for_review: bool,
}

impl QuestionState {
    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Correctness computed and cached at submission time.
    #[must_use]
    pub fn correct(&self) -> Option<bool> {
        self.correct
    }

    #[must_use]
    pub fn is_marked_for_review(&self) -> bool {
        self.marked_for_review
    }
}

//
// ─── SUBMISSION & TALLY ────────────────────────────────────────────────────────
//

/// Outcome of a successful submit, produced exactly once per question.
/// This is the hook for the attempt-recording side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub question_id: QuestionId,
    pub topic_id: TopicId,
    pub selected: usize,
    pub correct: bool,
}

/// Final counts for a completed session, consumed by the results view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTally {
    pub score: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub total: usize,
    pub correct_prompts: Vec<String>,
    pub incorrect_prompts: Vec<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// The quiz session state machine.
///
/// Holds the ordered immutable question set and a parallel vector of
/// per-question states, tracks the current position and running score, and
/// enforces the mode rules. Operations take `&mut self` and must be
/// serialized by the caller; a rejected operation leaves the state
/// untouched.
pub struct Session {
    mode: SessionMode,
    questions: Vec<Question>,
    states: Vec<QuestionState>,
    position: usize,
    score: u32,
    correct_count: u32,
    incorrect_count: u32,
    explanation_visible: bool,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session over an acquired question set.
    ///
    /// `started_at` should come from the services layer clock to keep time
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided, so
    /// `position` is a valid index for the session's whole lifetime.
    pub fn new(
        mode: SessionMode,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        let states = vec![QuestionState::default(); questions.len()];
        Ok(Self {
            mode,
            questions,
            states,
            position: 0,
            score: 0,
            correct_count: 0,
            incorrect_count: 0,
            explanation_visible: false,
            started_at,
            completed_at: None,
        })
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.position]
    }

    #[must_use]
    pub fn question_states(&self) -> &[QuestionState] {
        &self.states
    }

    #[must_use]
    pub fn state_at(&self, index: usize) -> Option<&QuestionState> {
        self.states.get(index)
    }

    #[must_use]
    pub fn explanation_visible(&self) -> bool {
        self.explanation_visible
    }

    /// Number of questions submitted so far.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.states.iter().filter(|s| s.submitted).count()
    }

    /// Aggregated progress snapshot for the surrounding UI.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = self.answered_count();
        SessionProgress {
            total: self.len(),
            answered,
            remaining: self.len() - answered,
            is_complete: self.is_complete(),
        }
    }

    /// Per-question status list for the navigation palette.
    #[must_use]
    pub fn palette(&self) -> Vec<PaletteSlot> {
        self.states
            .iter()
            .enumerate()
            .map(|(index, state)| PaletteSlot {
                status: match (state.submitted, state.correct, state.selected) {
                    (true, Some(true), _) => QuestionStatus::Correct,
                    (true, _, _) => QuestionStatus::Incorrect,
                    (false, _, Some(_)) => QuestionStatus::Answered,
                    (false, _, None) => QuestionStatus::Unanswered,
                },
                marked_for_review: state.marked_for_review,
                current: index == self.position,
            })
            .collect()
    }

    /// Select an option on the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` once the current question is
    /// submitted (selection is frozen), `SessionError::OptionOutOfRange` for
    /// a bad index, and `SessionError::Completed` after termination.
    pub fn select_option(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;

        let len = self.current_question().options().len();
        if index >= len {
            return Err(SessionError::OptionOutOfRange { index, len });
        }

        let state = &mut self.states[self.position];
        if state.submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        state.selected = Some(index);
        Ok(())
    }

    /// Submit the current question's selected option.
    ///
    /// Computes correctness against the question's correct index, caches it,
    /// and updates the running counters. The returned `Submission` is
    /// produced exactly once per question; callers use it to trigger the
    /// attempt-recording side effect, so UI-level retries cannot record
    /// twice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` with no option chosen,
    /// `SessionError::DoubleSubmit` on an already submitted question (a
    /// caller-bug signal; counters are untouched), and
    /// `SessionError::Completed` after termination.
    pub fn submit(&mut self) -> Result<Submission, SessionError> {
        self.ensure_in_progress()?;

        let state = &self.states[self.position];
        if state.submitted {
            return Err(SessionError::DoubleSubmit);
        }
        let Some(selected) = state.selected else {
            return Err(SessionError::NoSelection);
        };

        let question = &self.questions[self.position];
        let correct = question.is_correct(selected);
        let submission = Submission {
            question_id: question.id().clone(),
            topic_id: question.topic_id().clone(),
            selected,
            correct,
        };

        let state = &mut self.states[self.position];
        state.submitted = true;
        state.correct = Some(correct);

        if correct {
            self.score += 1;
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }

        Ok(submission)
    }

    /// Move to the next question, clamped to the last position.
    ///
    /// Navigation never requires the current question to be submitted and
    /// never touches review marks; it only hides the explanation panel. In
    /// practice mode, advancing past the last question completes the
    /// session without an explicit `end`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after termination.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.explanation_visible = false;

        if self.position + 1 < self.questions.len() {
            self.position += 1;
        } else if self.mode.auto_completes_on_overrun() {
            self.completed_at = Some(now);
        }
        // otherwise clamped: submitting on the last question and moving on
        // is a no-op
        Ok(())
    }

    /// Move to the previous question, clamped to position 0.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after termination.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.explanation_visible = false;
        self.position = self.position.saturating_sub(1);
        Ok(())
    }

    /// Jump straight to a question, used by the palette.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PositionOutOfRange` beyond the question list
    /// and `SessionError::Completed` after termination.
    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if index >= self.questions.len() {
            return Err(SessionError::PositionOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.explanation_visible = false;
        self.position = index;
        Ok(())
    }

    /// Toggle the review mark on any question, independent of its
    /// submission state. Never cleared by navigation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PositionOutOfRange` for a bad index and
    /// `SessionError::Completed` after termination.
    pub fn toggle_review(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let len = self.questions.len();
        let Some(state) = self.states.get_mut(index) else {
            return Err(SessionError::PositionOutOfRange { index, len });
        };
        state.marked_for_review = !state.marked_for_review;
        Ok(())
    }

    /// Show or hide the explanation panel for the current question. The
    /// flag is transient and resets on every navigation.
    pub fn toggle_explanation(&mut self) {
        self.explanation_visible = !self.explanation_visible;
    }

    /// End the session and return the final tally.
    ///
    /// First writer wins: a clock expiry racing a user-initiated end cannot
    /// double-finalize, the loser gets `SessionError::Completed`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session already ended.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<FinalTally, SessionError> {
        self.ensure_in_progress()?;
        self.completed_at = Some(now);
        Ok(self.final_tally())
    }

    /// Compute the tally over everything submitted so far. Available at any
    /// point; `end` returns exactly this at termination.
    #[must_use]
    pub fn final_tally(&self) -> FinalTally {
        let mut correct_prompts = Vec::new();
        let mut incorrect_prompts = Vec::new();
        for (question, state) in self.questions.iter().zip(&self.states) {
            match (state.submitted, state.correct) {
                (true, Some(true)) => correct_prompts.push(question.prompt().to_owned()),
                (true, _) => incorrect_prompts.push(question.prompt().to_owned()),
                (false, _) => {}
            }
        }

        FinalTally {
            score: self.score,
            correct: self.correct_count,
            incorrect: self.incorrect_count,
            total: self.questions.len(),
            correct_prompts,
            incorrect_prompts,
        }
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("questions_len", &self.questions.len())
            .field("position", &self.position)
            .field("score", &self.score)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
