use thiserror::Error;

pub const MAX_FEEDBACK_CHARS: usize = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("feedback text is empty")]
    Empty,

    #[error("feedback text is {len} characters, the limit is {MAX_FEEDBACK_CHARS}")]
    TooLong { len: usize },
}

/// Trim `text` and check it against the length bounds the service enforces.
pub fn validate_feedback(text: &str) -> Result<String, FeedbackError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FeedbackError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_FEEDBACK_CHARS {
        return Err(FeedbackError::TooLong { len });
    }
    Ok(trimmed.to_string())
}

/// Where a feedback submission for one item stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackStatus {
    Sending,
    Sent,
    /// The draft stays with the caller so the user can correct and resend.
    Failed(String),
}

/// Text being written in the feedback form for one item.
#[derive(Debug, Default)]
pub struct FeedbackDraft {
    pub text: String,
    last_status: Option<FeedbackStatus>,
}

impl FeedbackDraft {
    pub fn reset(&mut self) {
        self.text.clear();
        self.last_status = None;
    }

    /// Track the submission status once per frame. The text is cleared only
    /// when a submission turns into `Sent`, so anything typed afterwards stays.
    pub fn observe(&mut self, status: Option<&FeedbackStatus>) {
        if status == Some(&FeedbackStatus::Sent) && self.last_status.as_ref() != status {
            self.text.clear();
        }
        self.last_status = status.cloned();
    }
}
