use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{QuestionRecord, StorageError};
use quiz_core::model::Question;

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, StorageError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|err| StorageError::Serialization(err.to_string()))
}

/// Decode one `questions` row into a validated domain `Question`.
pub(crate) fn question_from_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let options_json: String = column(row, "options")?;
    let tags_json: String = column(row, "tags")?;
    let correct_index: i64 = column(row, "correct_index")?;

    let record = QuestionRecord {
        id: column(row, "id")?,
        topic_id: column(row, "topic_id")?,
        prompt: column(row, "prompt")?,
        options: serde_json::from_str(&options_json)
            .map_err(|err| StorageError::Serialization(err.to_string()))?,
        correct_index: usize::try_from(correct_index)
            .map_err(|err| StorageError::Serialization(err.to_string()))?,
        explanation: column(row, "explanation")?,
        tags: serde_json::from_str(&tags_json)
            .map_err(|err| StorageError::Serialization(err.to_string()))?,
        difficulty: column(row, "difficulty")?,
    };

    record
        .into_question()
        .map_err(|err| StorageError::Serialization(err.to_string()))
}
