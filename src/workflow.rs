use crate::client::{AnalysisResult, ApiClient};
use crate::error::{AnalysisError, SubmitError, ValidationError};
use crate::feedback::{FeedbackDraft, FeedbackForm, FeedbackSubmission};
use crate::history::{HistoryEntry, RecentHistory};
use crate::url_validator::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Requesting,
    Succeeded,
    Failed,
}

/// Handle for one in-flight analysis. Only the ticket of the newest
/// submission can change workflow state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    url: String,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Transient notification for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Read-only view of the workflow handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct WorkflowSnapshot {
    pub phase: Phase,
    pub result: Option<AnalysisResult>,
    pub error: Option<AnalysisError>,
    pub history: Vec<HistoryEntry>,
    pub feedback_draft: Option<FeedbackDraft>,
}

/// Canonical state of the analysis session.
///
/// Presentation code reads snapshots and calls the transition methods; it
/// never edits fields directly. Every `begin` starts a new generation, and
/// `complete` only accepts the ticket of the current one, so a slow response
/// from a superseded request is dropped instead of overwriting newer state.
#[derive(Debug)]
pub struct Workflow {
    phase: Phase,
    generation: u64,
    result: Option<AnalysisResult>,
    error: Option<AnalysisError>,
    last_result: Option<AnalysisResult>,
    history: RecentHistory,
    feedback: FeedbackForm,
    notices: Vec<Notice>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            result: None,
            error: None,
            last_result: None,
            history: RecentHistory::new(),
            feedback: FeedbackForm::new(),
            notices: Vec::new(),
        }
    }

    /// Start a new submission from any state.
    ///
    /// On success the workflow is `Requesting` and the returned ticket must be
    /// passed back to [`Workflow::complete`] with the outcome. A validation
    /// failure moves straight to `Failed`; nothing is dispatched.
    pub fn begin(&mut self, input: &str) -> Result<Ticket, ValidationError> {
        self.generation += 1;
        self.phase = Phase::Validating;
        self.result = None;
        self.error = None;

        if let Err(e) = validate(input) {
            log::debug!("Submission #{} rejected: {e}", self.generation);
            self.fail(e.into());
            return Err(e);
        }

        self.phase = Phase::Requesting;
        let ticket = Ticket {
            generation: self.generation,
            url: input.trim().to_string(),
        };
        log::debug!("Submission #{} requesting {}", ticket.generation, ticket.url);
        Ok(ticket)
    }

    /// Apply the outcome of the request behind `ticket`.
    ///
    /// Returns `false` when the ticket was superseded and the outcome dropped.
    pub fn complete(
        &mut self,
        ticket: &Ticket,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> bool {
        if ticket.generation != self.generation || self.phase != Phase::Requesting {
            log::debug!(
                "Dropping stale response for {} (generation {}, current {})",
                ticket.url,
                ticket.generation,
                self.generation
            );
            return false;
        }

        match outcome {
            Ok(result) => self.succeed(result),
            Err(e) => self.fail(e),
        }
        true
    }

    /// Run one submission to completion against `api`.
    pub async fn submit(
        &mut self,
        api: &ApiClient,
        input: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let ticket = self.begin(input)?;
        let outcome = api.analyze(ticket.url()).await;
        self.complete(&ticket, outcome.clone());
        outcome
    }

    fn succeed(&mut self, result: AnalysisResult) {
        self.notices.push(Notice::Success(format!(
            "{} Analysis complete: {}",
            result.risk_level.marker(),
            result.risk_level
        )));
        self.history.push(HistoryEntry::capture(&result));
        self.last_result = Some(result.clone());
        self.result = Some(result);
        self.phase = Phase::Succeeded;
    }

    fn fail(&mut self, error: AnalysisError) {
        if let AnalysisError::NetworkError { detail } = &error {
            log::debug!("Analysis failed: {detail}");
        }
        self.notices.push(Notice::Error(error.to_string()));
        self.error = Some(error);
        self.phase = Phase::Failed;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Result currently on display.
    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        self.error.as_ref()
    }

    /// Most recent successful result of the session, kept across new
    /// submissions so the feedback flow can refer back to it.
    pub fn last_result(&self) -> Option<&AnalysisResult> {
        self.last_result.as_ref()
    }

    pub fn history(&self) -> &RecentHistory {
        &self.history
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Validating | Phase::Requesting)
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase: self.phase,
            result: self.result.clone(),
            error: self.error.clone(),
            history: self.history.list(),
            feedback_draft: self.feedback.draft().cloned(),
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Open the feedback flow seeded from the last result.
    pub fn open_feedback(&mut self) -> &mut FeedbackDraft {
        self.feedback.open(self.last_result.as_ref())
    }

    pub fn feedback(&self) -> &FeedbackForm {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut FeedbackForm {
        &mut self.feedback
    }

    /// Validate the open draft for sending. The draft stays in place until
    /// [`Workflow::settle_feedback`] reports a successful send.
    pub fn prepare_feedback(&mut self) -> Result<FeedbackSubmission, SubmitError> {
        self.feedback.prepare().inspect_err(|e| {
            self.notices.push(Notice::Error(e.to_string()));
        })
    }

    pub fn settle_feedback(&mut self, sent: &FeedbackSubmission, outcome: &Result<(), SubmitError>) {
        self.feedback.settle(sent, outcome);
        self.notices.push(match outcome {
            Ok(()) => Notice::Success(
                "🎉 Thank you! Your feedback helps improve our detection system".to_string(),
            ),
            Err(e) => Notice::Error(e.to_string()),
        });
    }
}
