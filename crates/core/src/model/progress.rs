use serde::{Deserialize, Serialize};

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Palette colouring for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Unanswered,
    /// An option is selected but not yet submitted.
    Answered,
    Correct,
    Incorrect,
}

/// One palette cell: status plus the flags the palette renders on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteSlot {
    pub status: QuestionStatus,
    pub marked_for_review: bool,
    pub current: bool,
}
