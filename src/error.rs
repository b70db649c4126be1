use std::fmt;

/// Why user supplied URL text was rejected before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a URL")]
    EmptyInput,
    #[error("URL must start with http:// or https://")]
    MissingScheme,
    #[error("Please enter a valid URL")]
    MalformedUrl,
}

/// Failure of a single analysis request.
///
/// The `Display` output is the message shown to the user. Transport details
/// live in `detail` and are only logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("{message}")]
    BadRequest { message: String },
    #[error("Server error. Please try again later.")]
    ServerError,
    #[error("Failed to analyze URL. Please check your API connection.")]
    NetworkError { detail: String },
}

impl AnalysisError {
    pub fn network(detail: impl Into<String>) -> Self {
        AnalysisError::NetworkError {
            detail: detail.into(),
        }
    }
}

/// Form field that blocked a feedback submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackField {
    Url,
    ActualThreat,
    Category,
}

impl FeedbackField {
    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackField::Url => "url",
            FeedbackField::ActualThreat => "actualThreat",
            FeedbackField::Category => "category",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            FeedbackField::Url => "Please enter a valid URL",
            FeedbackField::ActualThreat => "Please select the actual threat level",
            FeedbackField::Category => "Please select a feedback category",
        }
    }
}

impl fmt::Display for FeedbackField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("{}", .missing_field.prompt())]
    IncompleteSubmission { missing_field: FeedbackField },
    #[error("Failed to submit feedback. Please try again.")]
    NetworkError { detail: String },
    #[error("Failed to submit feedback. Please try again.")]
    ServerError { status: u16 },
}
