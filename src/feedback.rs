use crate::client::{AnalysisResult, ApiClient};
use crate::error::{FeedbackField, SubmitError};
use crate::threat::{FeedbackCategory, ThreatLabel};
use crate::url_validator::validate;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Editable feedback form state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub url: String,
    pub actual_threat: Option<ThreatLabel>,
    pub our_prediction: Option<ThreatLabel>,
    pub description: String,
    pub category: Option<FeedbackCategory>,
}

/// Wire record for `POST /api/feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    pub url: String,
    pub actual_threat: ThreatLabel,
    #[serde(serialize_with = "label_or_empty")]
    pub our_prediction: Option<ThreatLabel>,
    pub description: String,
    pub category: FeedbackCategory,
    #[serde(serialize_with = "iso_timestamp")]
    pub submitted_at: DateTime<Utc>,
}

fn label_or_empty<S: Serializer>(label: &Option<ThreatLabel>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(label.map(|l| l.as_str()).unwrap_or_default())
}

fn iso_timestamp<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Seed a draft from the last analysis of this session, if any.
pub fn prefill(last_result: Option<&AnalysisResult>) -> FeedbackDraft {
    match last_result {
        Some(result) => FeedbackDraft {
            url: result.analyzed_url.clone(),
            our_prediction: Some(result.risk_level),
            ..FeedbackDraft::default()
        },
        None => FeedbackDraft::default(),
    }
}

impl FeedbackDraft {
    /// Boundary check before anything is sent. Fails on the first missing
    /// field in form order: url, actual threat, category.
    pub fn to_submission(&self) -> Result<FeedbackSubmission, SubmitError> {
        if let Err(e) = validate(&self.url) {
            log::debug!("Feedback URL '{}' rejected: {e}", self.url);
            return Err(SubmitError::IncompleteSubmission {
                missing_field: FeedbackField::Url,
            });
        }

        let actual_threat = self.actual_threat.ok_or(SubmitError::IncompleteSubmission {
            missing_field: FeedbackField::ActualThreat,
        })?;
        let category = self.category.ok_or(SubmitError::IncompleteSubmission {
            missing_field: FeedbackField::Category,
        })?;

        let our_prediction = self.effective_prediction();

        Ok(FeedbackSubmission {
            url: self.url.trim().to_string(),
            actual_threat,
            our_prediction,
            description: self.description.trim().to_string(),
            category,
            submitted_at: Utc::now(),
        })
    }

    /// Prediction as it would be sent: only misclassification reports carry one.
    fn effective_prediction(&self) -> Option<ThreatLabel> {
        match self.category {
            Some(category) if category.collects_prediction() => self.our_prediction,
            _ => None,
        }
    }

    fn produced(&self, submission: &FeedbackSubmission) -> bool {
        self.url.trim() == submission.url
            && self.actual_threat == Some(submission.actual_threat)
            && self.category == Some(submission.category)
            && self.effective_prediction() == submission.our_prediction
            && self.description.trim() == submission.description
    }
}

/// The open feedback flow. Holds the draft until it is sent successfully.
#[derive(Debug, Clone, Default)]
pub struct FeedbackForm {
    draft: Option<FeedbackDraft>,
}

impl FeedbackForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reopen) the form seeded from `last_result`.
    pub fn open(&mut self, last_result: Option<&AnalysisResult>) -> &mut FeedbackDraft {
        self.draft.insert(prefill(last_result))
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&FeedbackDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut FeedbackDraft> {
        self.draft.as_mut()
    }

    /// Validate the open draft without consuming it.
    pub fn prepare(&self) -> Result<FeedbackSubmission, SubmitError> {
        match &self.draft {
            Some(draft) => draft.to_submission(),
            None => FeedbackDraft::default().to_submission(),
        }
    }

    /// Apply the outcome of sending `sent`. A success discards the draft that
    /// produced it; a failure leaves the draft untouched.
    pub fn settle(&mut self, sent: &FeedbackSubmission, outcome: &Result<(), SubmitError>) {
        match outcome {
            Ok(()) => {
                if self.draft.as_ref().is_some_and(|d| d.produced(sent)) {
                    self.draft = None;
                }
            }
            Err(e) => log::debug!("Keeping feedback draft for {} after failure: {e}", sent.url),
        }
    }
}

/// Sends feedback drafts to the backend, one attempt per call.
#[derive(Debug, Clone)]
pub struct FeedbackReporter {
    api: ApiClient,
}

impl FeedbackReporter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn submit(&self, form: &mut FeedbackForm) -> Result<(), SubmitError> {
        let submission = form.prepare()?;
        let outcome = self.api.submit_feedback(&submission).await;
        form.settle(&submission, &outcome);
        outcome
    }
}
