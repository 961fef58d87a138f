use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use quiz_core::model::{QuestionId, TopicId, UserId};
use storage::repository::{ProgressRepository, StorageError};

/// Where the remote progress collaborator lives.
#[derive(Clone, Debug)]
pub struct RemoteProgressConfig {
    pub base_url: String,
}

#[derive(Serialize)]
struct SolvedQuestionBody<'a> {
    user_id: &'a str,
    question_id: &'a str,
    is_correct: bool,
}

#[derive(Serialize)]
struct TopicAttemptBody<'a> {
    user_id: &'a str,
    topic_id: &'a str,
}

/// `ProgressRepository` over the REST collaborator. Used in place of the
/// local SQLite counters when progress lives server-side.
///
/// Transport timeouts are the HTTP layer's concern; configure them on the
/// `reqwest::Client` handed in here.
#[derive(Clone)]
pub struct RemoteProgressClient {
    client: Client,
    config: RemoteProgressConfig,
}

impl RemoteProgressClient {
    #[must_use]
    pub fn new(client: Client, config: RemoteProgressConfig) -> Self {
        Self { client, config }
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), StorageError> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Connection(format!(
                "progress endpoint {path} returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for RemoteProgressClient {
    async fn record_solved(
        &self,
        user: &UserId,
        question: &QuestionId,
        correct: bool,
    ) -> Result<(), StorageError> {
        self.post(
            "solved-questions",
            &SolvedQuestionBody {
                user_id: user.as_str(),
                question_id: question.as_str(),
                is_correct: correct,
            },
        )
        .await
    }

    async fn increment_topic_attempt(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<(), StorageError> {
        self.post(
            "topic-attempts",
            &TopicAttemptBody {
                user_id: user.as_str(),
                topic_id: topic.as_str(),
            },
        )
        .await
    }
}
