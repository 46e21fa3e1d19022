use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TallyError {
    #[error("The counter not exist: {0}")]
    NotFound(String),

    #[error("invalid window: begin {begin} is after end {end}")]
    InvalidRange { begin: i64, end: i64 },

    #[error("counter {0} would leave the i64 range")]
    Overflow(String),

    #[error("Can not delete the default counter")]
    DeleteDefault,

    #[error("summarizer has been destroyed")]
    Closed,

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid hour summary: {0}")]
    InvalidSummary(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
