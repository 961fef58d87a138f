mod ids;
mod progress;
mod question;
mod session;

pub use ids::{QuestionId, TopicId, UserId};
pub use progress::{PaletteSlot, QuestionStatus, SessionProgress};
pub use question::{Question, QuestionError};
pub use session::{FinalTally, QuestionState, Session, SessionError, SessionMode, Submission};
