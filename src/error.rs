use chrono::NaiveDate;

/// Domain errors raised by the orchestration layer. The engines themselves are total.
#[derive(Debug, thiserror::Error)]
pub enum ReadQuestError {
    #[error("Invalid timestamp '{0}': expected RFC 3339 or YYYY-MM-DD")]
    InvalidTimestamp(String),

    #[error("Invalid timezone offset: {0} minutes")]
    InvalidTimezoneOffset(i32),

    #[error("Book #{0} not found")]
    BookNotFound(i64),

    #[error("Session #{0} not found")]
    SessionNotFound(i64),

    #[error("No streak freezes left")]
    NoFreezesLeft,

    #[error("{0} is already frozen")]
    AlreadyFrozen(NaiveDate),

    #[error("{0} already has reading activity, no freeze needed")]
    AlreadyActive(NaiveDate),

    #[error("{0} is in the future")]
    FutureDate(NaiveDate),

    #[error("Pages read must be greater than zero")]
    InvalidPages,
}
