use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use quiz_core::model::{QuestionId, Submission, TopicId, UserId};
use storage::repository::ProgressRepository;

/// A persistence side effect that failed after `submit` already succeeded
/// locally. Reported on a side channel for visibility; the in-memory score
/// is never rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFailure {
    Solved { question: QuestionId, error: String },
    TopicAttempt { topic: TopicId, error: String },
}

/// Persists each submitted answer to the two independent progress
/// counters: the solved-question record and the topic's attempted counter.
///
/// Both calls are fire-and-forget relative to the session flow. They run
/// as separate spawned tasks with no ordering between them; each failure
/// is logged and forwarded to the failure channel, and never affects the
/// session's local score. The local score is the user's session truth,
/// the remote counters are best-effort analytics.
#[derive(Clone)]
pub struct AttemptRecorder {
    progress: Arc<dyn ProgressRepository>,
    failures: Option<UnboundedSender<RecordFailure>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl AttemptRecorder {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressRepository>) -> Self {
        Self {
            progress,
            failures: None,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Forward record failures to the given channel in addition to the log.
    #[must_use]
    pub fn with_failure_channel(mut self, failures: UnboundedSender<RecordFailure>) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Fire both persistence calls for a submission.
    ///
    /// Returns immediately; the calls may land in either order and may
    /// overlap with calls from adjacent questions. Callers invoke this
    /// exactly once per submission (the state machine's one-shot
    /// `Submission` guarantees that).
    pub fn dispatch(&self, user: &UserId, submission: &Submission) {
        let solved = {
            let progress = Arc::clone(&self.progress);
            let failures = self.failures.clone();
            let user = user.clone();
            let question = submission.question_id.clone();
            let correct = submission.correct;
            tokio::spawn(async move {
                if let Err(err) = progress.record_solved(&user, &question, correct).await {
                    log::warn!("failed to record solved question {question}: {err}");
                    if let Some(tx) = failures {
                        let _ = tx.send(RecordFailure::Solved {
                            question,
                            error: err.to_string(),
                        });
                    }
                }
            })
        };

        let attempt = {
            let progress = Arc::clone(&self.progress);
            let failures = self.failures.clone();
            let user = user.clone();
            let topic = submission.topic_id.clone();
            tokio::spawn(async move {
                if let Err(err) = progress.increment_topic_attempt(&user, &topic).await {
                    log::warn!("failed to increment attempts for topic {topic}: {err}");
                    if let Some(tx) = failures {
                        let _ = tx.send(RecordFailure::TopicAttempt {
                            topic,
                            error: err.to_string(),
                        });
                    }
                }
            })
        };

        if let Ok(mut guard) = self.pending.lock() {
            guard.retain(|handle| !handle.is_finished());
            guard.push(solved);
            guard.push(attempt);
        }
    }

    /// Await every in-flight persistence call. Ending a session never
    /// cancels issued calls; this exists for tests and orderly shutdown.
    pub async fn join_pending(&self) {
        let handles: Vec<JoinHandle<()>> = match self.pending.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storage::repository::{InMemoryRepository, StorageError};
    use tokio::sync::mpsc;

    fn submission(question: &str, topic: &str, correct: bool) -> Submission {
        Submission {
            question_id: QuestionId::new(question),
            topic_id: TopicId::new(topic),
            selected: 0,
            correct,
        }
    }

    #[tokio::test]
    async fn dispatch_updates_both_counters() {
        let repo = Arc::new(InMemoryRepository::new());
        let recorder = AttemptRecorder::new(repo.clone());
        let user = UserId::new("u1");

        recorder.dispatch(&user, &submission("q1", "anatomy", true));
        recorder.dispatch(&user, &submission("q2", "anatomy", false));
        recorder.join_pending().await;

        assert_eq!(repo.solved(&user, &QuestionId::new("q1")), Some(true));
        assert_eq!(repo.solved(&user, &QuestionId::new("q2")), Some(false));
        assert_eq!(repo.attempt_count(&user, &TopicId::new("anatomy")), 2);
    }

    struct FailingProgress;

    #[async_trait]
    impl ProgressRepository for FailingProgress {
        async fn record_solved(
            &self,
            _user: &UserId,
            _question: &QuestionId,
            _correct: bool,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("progress endpoint down".into()))
        }

        async fn increment_topic_attempt(
            &self,
            _user: &UserId,
            _topic: &TopicId,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("progress endpoint down".into()))
        }
    }

    #[tokio::test]
    async fn failures_are_surfaced_on_the_side_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recorder =
            AttemptRecorder::new(Arc::new(FailingProgress)).with_failure_channel(tx);
        let user = UserId::new("u1");

        recorder.dispatch(&user, &submission("q1", "anatomy", true));
        recorder.join_pending().await;

        let mut failures = Vec::new();
        while let Ok(failure) = rx.try_recv() {
            failures.push(failure);
        }
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().any(|f| matches!(
            f,
            RecordFailure::Solved { question, .. } if question == &QuestionId::new("q1")
        )));
        assert!(failures.iter().any(|f| matches!(
            f,
            RecordFailure::TopicAttempt { topic, .. } if topic == &TopicId::new("anatomy")
        )));
    }
}
