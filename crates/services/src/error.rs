//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::SessionError;
use storage::repository::StorageError;

/// Errors emitted by `QuestionSetProvider`.
///
/// Acquisition failures are fatal to session start; no partial session is
/// ever created from a failed acquire.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("no questions available for the requested session")]
    Empty,
    #[error(transparent)]
    Fetch(#[from] StorageError),
}

/// Errors emitted by `SessionRunner`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error("no session has been started")]
    NotStarted,
    #[error("a timed session requires a duration")]
    MissingDuration,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
