pub mod client;
pub mod config;
pub mod error;
pub mod feedback;
pub mod history;
pub mod threat;
pub mod url_validator;
pub mod workflow;

pub use client::{AnalysisResult, ApiClient, FeedbackStats};
pub use config::Config;
pub use error::{AnalysisError, FeedbackField, SubmitError, ValidationError};
pub use feedback::{prefill, FeedbackDraft, FeedbackForm, FeedbackReporter, FeedbackSubmission};
pub use history::{HistoryEntry, RecentHistory};
pub use threat::{normalize, FeedbackCategory, ThreatLabel};
pub use url_validator::validate;
pub use workflow::{Notice, Phase, Ticket, Workflow, WorkflowSnapshot};
