#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod provider;
pub mod recorder;
pub mod remote;
pub mod runner;

pub use quiz_core::Clock;

pub use clock::SessionClock;
pub use error::{ProviderError, RunnerError};
pub use provider::{AcquiredSet, DEFAULT_SESSION_SIZE, QuestionSetProvider};
pub use recorder::{AttemptRecorder, RecordFailure};
pub use remote::{RemoteProgressClient, RemoteProgressConfig};
pub use runner::{SessionConfig, SessionRunner};
