use super::store::StoreError;

/// Failure taxonomy for poll operations. Every variant leaves the store untouched.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),
    #[error("the specified poll does not exist")]
    NotFound,
    #[error("the poll is not accepting votes")]
    Forbidden,
    #[error("the specified option does not exist for this poll")]
    InvalidOption,
    #[error("a vote from this voter has already been recorded for the poll")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PollError {
    /// Short label used in the `error` field of API responses.
    pub fn label(&self) -> &'static str {
        match self {
            PollError::Validation(_) => "Validation error",
            PollError::NotFound => "Poll not found",
            PollError::Forbidden => "Poll inactive",
            PollError::InvalidOption => "Invalid option",
            PollError::Conflict => "Already voted",
            PollError::Store(_) => "Internal server error",
        }
    }
}
