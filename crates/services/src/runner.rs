use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use quiz_core::Clock;
use quiz_core::clock::{ClockEvent, ClockState};
use quiz_core::model::{FinalTally, Session, SessionMode, Submission, TopicId, UserId};
use storage::repository::{RetestKeyRepository, Storage};

use crate::clock::SessionClock;
use crate::error::{ProviderError, RunnerError};
use crate::provider::QuestionSetProvider;
use crate::recorder::AttemptRecorder;

/// Per-session knobs that are not part of the mode itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    /// Countdown duration for timed sessions, in seconds.
    pub duration_secs: Option<u64>,
    /// Whether a practice session runs the stopwatch.
    pub practice_clock: bool,
}

/// Orchestrates one session at a time: acquisition, the state machine,
/// the clock, attempt recording and the retest key capture.
///
/// The runner is the single caller of the `Session`'s mutating operations;
/// the surrounding UI serializes calls into it.
pub struct SessionRunner {
    clock: Clock,
    provider: QuestionSetProvider,
    recorder: AttemptRecorder,
    retest_keys: Arc<dyn RetestKeyRepository>,
    user: UserId,
    session: Option<Session>,
    session_clock: Option<SessionClock>,
    clock_seconds: Option<u64>,
    tally: Option<FinalTally>,
}

impl SessionRunner {
    #[must_use]
    pub fn new(
        clock: Clock,
        provider: QuestionSetProvider,
        recorder: AttemptRecorder,
        retest_keys: Arc<dyn RetestKeyRepository>,
        user: UserId,
    ) -> Self {
        Self {
            clock,
            provider,
            recorder,
            retest_keys,
            user,
            session: None,
            session_clock: None,
            clock_seconds: None,
            tally: None,
        }
    }

    /// Wire a runner straight onto a `Storage` aggregate.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage, user: UserId) -> Self {
        Self::new(
            clock,
            QuestionSetProvider::new(Arc::clone(&storage.questions)),
            AttemptRecorder::new(Arc::clone(&storage.progress)),
            Arc::clone(&storage.retest_keys),
            user,
        )
    }

    /// Start a fresh session for the user's topic selection.
    ///
    /// For timed and untimed modes the acquired order is saved as the
    /// retest key list before the session begins; a failed save is logged
    /// and does not block the session (only a later retest is lost).
    /// Returns the clock event stream when the mode runs a clock.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::MissingDuration` for a timed start with no
    /// duration, `RunnerError::Provider` when acquisition fails (no partial
    /// session is created) and `RunnerError::Session` if the set is empty.
    pub async fn start(
        &mut self,
        mode: SessionMode,
        topics: &[TopicId],
        config: SessionConfig,
    ) -> Result<Option<UnboundedReceiver<ClockEvent>>, RunnerError> {
        if mode == SessionMode::Retest {
            return self.start_retest().await;
        }
        if mode == SessionMode::Timed && config.duration_secs.is_none() {
            return Err(RunnerError::MissingDuration);
        }

        let set = self.provider.acquire(mode, &self.user, topics).await?;

        if mode.saves_retest_keys() {
            if let Err(err) = self.retest_keys.save_keys(&set.retest_keys()).await {
                log::warn!("failed to save retest keys: {err}");
            }
        }

        self.install_session(Session::new(mode, set.into_questions(), self.clock.now())?);
        Ok(self.start_clock(mode, config))
    }

    /// Reconstruct and start the most recently captured exam set.
    ///
    /// Retest sessions never overwrite the stored key list and never run a
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Provider` when the key list is empty, cannot
    /// be loaded, or resolves to no questions.
    pub async fn start_retest(
        &mut self,
    ) -> Result<Option<UnboundedReceiver<ClockEvent>>, RunnerError> {
        let keys = self
            .retest_keys
            .load_keys()
            .await
            .map_err(ProviderError::from)?;
        let set = self.provider.acquire_retest(&keys).await?;

        self.install_session(Session::new(
            SessionMode::Retest,
            set.into_questions(),
            self.clock.now(),
        )?);
        Ok(None)
    }

    fn install_session(&mut self, session: Session) {
        self.stop_clock();
        self.session = Some(session);
        self.clock_seconds = None;
        self.tally = None;
    }

    fn start_clock(
        &mut self,
        mode: SessionMode,
        config: SessionConfig,
    ) -> Option<UnboundedReceiver<ClockEvent>> {
        let state = ClockState::for_mode(mode, config.duration_secs, config.practice_clock)?;
        self.clock_seconds = Some(state.value());
        let (clock, events) = SessionClock::start(state);
        self.session_clock = Some(clock);
        Some(events)
    }

    fn stop_clock(&mut self) {
        if let Some(clock) = self.session_clock.take() {
            clock.stop();
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Latest clock value seen, in seconds (remaining or elapsed).
    #[must_use]
    pub fn clock_seconds(&self) -> Option<u64> {
        self.clock_seconds
    }

    /// The final tally once the session has been finalized.
    #[must_use]
    pub fn tally(&self) -> Option<&FinalTally> {
        self.tally.as_ref()
    }

    fn session_mut(&mut self) -> Result<&mut Session, RunnerError> {
        self.session.as_mut().ok_or(RunnerError::NotStarted)
    }

    /// Select an option on the current question.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and forwards the
    /// state machine's rejections.
    pub fn select_option(&mut self, index: usize) -> Result<(), RunnerError> {
        Ok(self.session_mut()?.select_option(index)?)
    }

    /// Submit the current question and fire the recording side effect.
    ///
    /// The recorder is dispatched exactly once per question: a repeated
    /// submit is rejected by the state machine before anything is spawned.
    /// Recording failures surface on the recorder's failure channel, never
    /// here.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and forwards the
    /// state machine's rejections (`NoSelection`, `DoubleSubmit`, ...).
    pub fn submit(&mut self) -> Result<Submission, RunnerError> {
        let user = self.user.clone();
        let submission = self.session_mut()?.submit()?;
        self.recorder.dispatch(&user, &submission);
        Ok(submission)
    }

    /// Move to the next question. In practice mode this finalizes the
    /// session when navigation runs past the last question.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and forwards the
    /// state machine's rejections.
    pub fn next(&mut self) -> Result<(), RunnerError> {
        let now = self.clock.now();
        let session = self.session_mut()?;
        session.next(now)?;
        if session.is_complete() {
            self.tally = Some(session.final_tally());
            self.stop_clock();
        }
        Ok(())
    }

    /// Move to the previous question.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and forwards the
    /// state machine's rejections.
    pub fn previous(&mut self) -> Result<(), RunnerError> {
        Ok(self.session_mut()?.previous()?)
    }

    /// Jump straight to a question from the palette.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and forwards the
    /// state machine's rejections.
    pub fn jump_to(&mut self, index: usize) -> Result<(), RunnerError> {
        Ok(self.session_mut()?.jump_to(index)?)
    }

    /// Toggle the review mark on a question.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and forwards the
    /// state machine's rejections.
    pub fn toggle_review(&mut self, index: usize) -> Result<(), RunnerError> {
        Ok(self.session_mut()?.toggle_review(index)?)
    }

    /// Toggle explanation visibility for the current question.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start`.
    pub fn toggle_explanation(&mut self) -> Result<(), RunnerError> {
        self.session_mut()?.toggle_explanation();
        Ok(())
    }

    /// React to a clock event from the stream returned by `start`.
    ///
    /// Ticks update the cached clock value. Expiry finalizes the session
    /// idempotently: a second expiry, or one racing a user-initiated end,
    /// is a no-op. Expiry is the only non-user-initiated termination.
    pub fn handle_clock_event(&mut self, event: ClockEvent) {
        match event {
            ClockEvent::Tick(value) => self.clock_seconds = Some(value),
            ClockEvent::Expired => {
                self.clock_seconds = Some(0);
                let now = self.clock.now();
                self.finalize(now);
            }
        }
    }

    /// End the session and return the final tally.
    ///
    /// Stops the clock. In-flight recording calls for already submitted
    /// questions are not cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::NotStarted` before `start` and
    /// `SessionError::Completed` if the session was already finalized
    /// (by expiry, practice auto-completion, or an earlier end).
    pub fn end(&mut self) -> Result<FinalTally, RunnerError> {
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(RunnerError::NotStarted)?;
        let tally = session.end(now)?;
        self.tally = Some(tally.clone());
        self.stop_clock();
        Ok(tally)
    }

    fn finalize(&mut self, now: DateTime<Utc>) {
        if let Some(session) = self.session.as_mut() {
            if !session.is_complete() {
                if let Ok(tally) = session.end(now) {
                    self.tally = Some(tally);
                }
            } else if self.tally.is_none() {
                self.tally = Some(session.final_tally());
            }
        }
        self.stop_clock();
    }

    /// Await in-flight recording calls; test and shutdown aid.
    pub async fn join_recorder(&self) {
        self.recorder.join_pending().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, QuestionId, SessionError};
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn build_question(id: u32, topic: &str) -> Question {
        Question::new(
            QuestionId::new(format!("q{id}")),
            TopicId::new(topic),
            format!("prompt {id}"),
            vec!["a".into(), "b".into()],
            0,
        )
        .unwrap()
    }

    fn seeded_repo(n: u32, topic: &str) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for id in 1..=n {
            repo.insert_question(build_question(id, topic)).unwrap();
        }
        repo
    }

    fn build_storage(repo: &InMemoryRepository) -> Storage {
        Storage {
            questions: Arc::new(repo.clone()),
            retest_keys: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
        }
    }

    fn build_runner(repo: &InMemoryRepository) -> SessionRunner {
        SessionRunner::from_storage(
            Clock::fixed(fixed_now()),
            &build_storage(repo),
            UserId::new("u1"),
        )
    }

    #[test]
    fn operations_before_start_are_rejected() {
        let repo = seeded_repo(1, "anatomy");
        let mut runner = build_runner(&repo);

        assert!(matches!(runner.submit(), Err(RunnerError::NotStarted)));
        assert!(matches!(runner.next(), Err(RunnerError::NotStarted)));
        assert!(matches!(runner.end(), Err(RunnerError::NotStarted)));
        assert!(runner.session().is_none());
    }

    #[tokio::test]
    async fn untimed_start_saves_the_acquired_order_as_retest_keys() {
        let repo = seeded_repo(5, "anatomy");
        let mut runner = build_runner(&repo);

        let events = runner
            .start(
                SessionMode::Untimed,
                &[TopicId::new("anatomy")],
                SessionConfig::default(),
            )
            .await
            .unwrap();
        assert!(events.is_none());

        let session_order: Vec<QuestionId> = runner
            .session()
            .unwrap()
            .questions()
            .iter()
            .map(|q| q.id().clone())
            .collect();
        let saved = repo.load_keys().await.unwrap();
        assert_eq!(saved, session_order);
    }

    #[tokio::test]
    async fn practice_start_saves_no_retest_keys() {
        let repo = seeded_repo(3, "anatomy");
        let mut runner = build_runner(&repo);

        runner
            .start(
                SessionMode::Practice,
                &[TopicId::new("anatomy")],
                SessionConfig::default(),
            )
            .await
            .unwrap();

        assert!(repo.load_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn practice_navigation_past_the_last_question_finalizes() {
        let repo = seeded_repo(1, "anatomy");
        let mut runner = build_runner(&repo);

        runner
            .start(
                SessionMode::Practice,
                &[TopicId::new("anatomy")],
                SessionConfig::default(),
            )
            .await
            .unwrap();

        runner.select_option(0).unwrap();
        runner.submit().unwrap();
        runner.next().unwrap();

        let tally = runner.tally().unwrap();
        assert_eq!(tally.total, 1);
        assert_eq!(tally.correct, 1);
        assert!(matches!(
            runner.end(),
            Err(RunnerError::Session(SessionError::Completed))
        ));
    }

    #[tokio::test]
    async fn expiry_finalizes_once_and_blocks_a_later_end() {
        let repo = seeded_repo(2, "anatomy");
        let mut runner = build_runner(&repo);

        let events = runner
            .start(
                SessionMode::Timed,
                &[TopicId::new("anatomy")],
                SessionConfig {
                    duration_secs: Some(600),
                    practice_clock: false,
                },
            )
            .await
            .unwrap();
        assert!(events.is_some());
        assert_eq!(runner.clock_seconds(), Some(600));

        runner.select_option(0).unwrap();
        runner.submit().unwrap();

        runner.handle_clock_event(ClockEvent::Expired);
        let tally = runner.tally().unwrap().clone();
        assert_eq!(tally.total, 2);
        assert_eq!(tally.correct, 1);
        assert_eq!(runner.clock_seconds(), Some(0));

        // a duplicate expiry is absorbed without touching the tally
        runner.handle_clock_event(ClockEvent::Expired);
        assert_eq!(runner.tally(), Some(&tally));

        assert!(matches!(
            runner.end(),
            Err(RunnerError::Session(SessionError::Completed))
        ));
    }

    #[tokio::test]
    async fn ticks_update_the_cached_clock_value() {
        let repo = seeded_repo(1, "anatomy");
        let mut runner = build_runner(&repo);

        runner
            .start(
                SessionMode::Timed,
                &[TopicId::new("anatomy")],
                SessionConfig {
                    duration_secs: Some(10),
                    practice_clock: false,
                },
            )
            .await
            .unwrap();

        runner.handle_clock_event(ClockEvent::Tick(9));
        assert_eq!(runner.clock_seconds(), Some(9));
    }

    #[tokio::test]
    async fn timed_start_without_a_duration_is_rejected() {
        let repo = seeded_repo(3, "anatomy");
        let mut runner = build_runner(&repo);

        let err = runner
            .start(
                SessionMode::Timed,
                &[TopicId::new("anatomy")],
                SessionConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::MissingDuration));

        // rejected before acquisition, so nothing was captured
        assert!(runner.session().is_none());
        assert!(repo.load_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_retest_with_no_saved_keys_fails() {
        let repo = seeded_repo(3, "anatomy");
        let mut runner = build_runner(&repo);

        let err = runner.start_retest().await.unwrap_err();
        assert!(matches!(err, RunnerError::Provider(ProviderError::Empty)));
    }
}
