use harmony_store::StoreError;
use thiserror::Error;

/// Input rejected before any store call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("text must not be blank")]
    BlankText,

    #[error("community name must not be blank")]
    BlankName,

    #[error("'{0}' is not a recognised mood")]
    UnknownMood(String),

    #[error("'{0}' is not a valid reaction")]
    InvalidEmoji(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no group selected")]
    NoGroupSelected,

    /// A store read or write was rejected; local state is untouched.
    #[error("store request failed: {0}")]
    Remote(#[from] StoreError),

    /// A live subscription failed and has been dropped.
    #[error("live updates failed: {0}")]
    Subscription(#[source] StoreError),
}

impl CoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// Short message suitable for showing next to the control that failed.
    pub fn display_message(&self) -> String {
        match self {
            CoreError::Validation(ValidationError::BlankText) => "Please write something first.".into(),
            CoreError::Validation(ValidationError::BlankName) => "Please give the community a name.".into(),
            CoreError::Validation(ValidationError::UnknownMood(_)) => "Please pick a mood.".into(),
            CoreError::Validation(ValidationError::InvalidEmoji(_)) => "That reaction isn't available.".into(),
            CoreError::NoGroupSelected => "Join a community to start sharing reflections!".into(),
            CoreError::Remote(_) => "Something went wrong. Please try again.".into(),
            CoreError::Subscription(_) => "Live updates stopped. Reopen the group to retry.".into(),
        }
    }
}
