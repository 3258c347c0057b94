//! Client side of the anonymous feedback lifecycle.
//!
//! A [`FeedbackSession`] owns everything one user's flow touches: the
//! backend handle, the tracking-ID cache and the taxonomy used for
//! validation. Operations take `&mut self`, so a session never has two
//! requests in flight.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::db::{ClientStorage, TrackingCache};
use crate::error::{BackendError, FeedbackError, Field};
use crate::schema::{
    FeedbackDraft, FeedbackStatus, FeedbackSubmission, StatusLookup, StatusUpdate, SubmitResponse,
    TrackingRecord,
};
use crate::taxonomy::Taxonomy;
use crate::validation::{normalize_review_status, normalize_tracking_id, validate_submission};

/// Remote side of the lifecycle.
#[allow(async_fn_in_trait)]
pub trait FeedbackBackend {
    async fn submit(&self, submission: &FeedbackSubmission) -> Result<SubmitResponse, BackendError>;

    async fn status(&self, tracking_id: &str) -> Result<StatusLookup, BackendError>;

    async fn update_status(
        &self,
        tracking_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), BackendError>;

    /// Whether reviewer-side calls can be authenticated.
    fn has_credentials(&self) -> bool;
}

/// Outcome of the latest submission.
///
/// There is no in-flight variant: `submit` holds `&mut self` until the
/// request resolves, so no reader could ever observe one.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Editing,
    Submitted { tracking_id: String },
    Failed {
        message: String,
        alternative_actions: Vec<String>,
    },
}

/// Outcome of the latest status check.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupState {
    Idle,
    Found {
        tracking_id: String,
        status: FeedbackStatus,
    },
    NotFound { tracking_id: String },
    Failed { message: String },
}

pub struct FeedbackSession<B, S> {
    backend: B,
    cache: TrackingCache<S>,
    taxonomy: Taxonomy,
    submission: SubmissionState,
    lookup: LookupState,
}

impl<B: FeedbackBackend, S: ClientStorage> FeedbackSession<B, S> {
    pub fn new(backend: B, storage: S, taxonomy: Taxonomy) -> Self {
        Self {
            backend,
            cache: TrackingCache::load(storage),
            taxonomy,
            submission: SubmissionState::Editing,
            lookup: LookupState::Idle,
        }
    }

    pub fn submission_state(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn lookup_state(&self) -> &LookupState {
        &self.lookup
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn cache(&self) -> &TrackingCache<S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TrackingCache<S> {
        &mut self.cache
    }

    /// Back to an empty form after a submission finished.
    pub fn reset_submission(&mut self) {
        self.submission = SubmissionState::Editing;
    }

    /// Validates and posts a draft, returning the issued tracking ID.
    ///
    /// Invalid drafts never reach the backend. A tracking ID is cached only
    /// when the service actually returned one.
    pub async fn submit(&mut self, draft: &FeedbackDraft) -> Result<String, FeedbackError> {
        let submission = match validate_submission(draft, &self.taxonomy) {
            Ok(submission) => submission,
            Err(errors) => return Err(self.fail_submission(FeedbackError::Validation(errors))),
        };

        info!(
            feedback_type = %submission.feedback_type,
            category = %submission.category,
            severity = %submission.severity,
            "submitting anonymous feedback"
        );

        let result = self.backend.submit(&submission).await;
        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.fail_submission(err.into())),
        };

        let tracking_id = match accepted_tracking_id(response) {
            Ok(tracking_id) => tracking_id,
            Err(err) => return Err(self.fail_submission(err)),
        };

        let record = TrackingRecord {
            tracking_id: tracking_id.clone(),
            submitted_at: now_rfc3339(),
            category: submission.category,
            severity: submission.severity,
        };
        if let Err(err) = self.cache.record(record) {
            warn!("feedback submitted but tracking ID was not cached: {err}");
        }

        info!(tracking_id = %tracking_id, "feedback submitted");
        self.submission = SubmissionState::Submitted {
            tracking_id: tracking_id.clone(),
        };
        Ok(tracking_id)
    }

    /// Fetches the current status for a tracking ID. Never cached.
    pub async fn check_status(&mut self, raw_id: &str) -> Result<FeedbackStatus, FeedbackError> {
        let tracking_id = match normalize_tracking_id(raw_id) {
            Ok(tracking_id) => tracking_id,
            Err(errors) => return Err(self.fail_lookup(FeedbackError::Validation(errors))),
        };

        let lookup = self.backend.status(&tracking_id).await;
        match lookup {
            Ok(StatusLookup::Found(status)) => {
                info!(tracking_id = %tracking_id, status = %status.status, "status found");
                self.lookup = LookupState::Found {
                    tracking_id,
                    status: status.clone(),
                };
                Ok(status)
            }
            Ok(StatusLookup::NotFound) => {
                info!(tracking_id = %tracking_id, "no feedback for tracking ID");
                self.lookup = LookupState::NotFound {
                    tracking_id: tracking_id.clone(),
                };
                Err(FeedbackError::NotFound { tracking_id })
            }
            Err(err) => Err(self.fail_lookup(err.into())),
        }
    }

    /// Reviewer-side status change.
    pub async fn update_status(
        &mut self,
        raw_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), FeedbackError> {
        let tracking_id = normalize_tracking_id(raw_id).map_err(FeedbackError::Validation)?;
        normalize_review_status(update.status.as_str()).map_err(FeedbackError::Validation)?;
        if !self.backend.has_credentials() {
            return Err(FeedbackError::validation(
                Field::Token,
                "an API token is required to update feedback status",
            ));
        }
        info!(tracking_id = %tracking_id, status = %update.status, "updating feedback status");
        let result = self.backend.update_status(&tracking_id, update).await;
        match result {
            Ok(()) => Ok(()),
            Err(BackendError::Http { status: 404, .. }) => {
                Err(FeedbackError::NotFound { tracking_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn fail_submission(&mut self, err: FeedbackError) -> FeedbackError {
        warn!("feedback submission failed: {err}");
        self.submission = SubmissionState::Failed {
            message: err.to_string(),
            alternative_actions: err.alternative_actions().to_vec(),
        };
        err
    }

    fn fail_lookup(&mut self, err: FeedbackError) -> FeedbackError {
        warn!("status lookup failed: {err}");
        self.lookup = LookupState::Failed {
            message: err.to_string(),
        };
        err
    }
}

/// The tracking ID exactly as issued. A missing `success` flag counts as
/// success when an ID came back.
fn accepted_tracking_id(response: SubmitResponse) -> Result<String, FeedbackError> {
    if response.success == Some(false) {
        return Err(FeedbackError::Api {
            status: None,
            message: response.message.unwrap_or_else(|| {
                "The feedback service could not accept your submission.".to_string()
            }),
            alternative_actions: response.alternative_actions,
        });
    }
    match response.tracking_id {
        Some(tracking_id) if !tracking_id.trim().is_empty() => Ok(tracking_id),
        _ => Err(FeedbackError::Api {
            status: None,
            message: "The feedback service did not return a tracking ID. \
                      Your submission may not have been recorded."
                .to_string(),
            alternative_actions: response.alternative_actions,
        }),
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MAX_TRACKED_IDS, MemoryStorage, TRACKING_IDS_KEY};
    use crate::error::StorageError;
    use crate::schema::{ReviewStatus, Severity};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeBackend {
        submit_responses: RefCell<VecDeque<Result<SubmitResponse, BackendError>>>,
        status_responses: RefCell<VecDeque<Result<StatusLookup, BackendError>>>,
        submitted: RefCell<Vec<FeedbackSubmission>>,
        calls: Cell<usize>,
        token: bool,
    }

    impl FakeBackend {
        fn with_submit(response: Result<SubmitResponse, BackendError>) -> Self {
            let backend = Self::default();
            backend.submit_responses.borrow_mut().push_back(response);
            backend
        }

        fn with_status(response: Result<StatusLookup, BackendError>) -> Self {
            let backend = Self::default();
            backend.status_responses.borrow_mut().push_back(response);
            backend
        }
    }

    impl FeedbackBackend for FakeBackend {
        async fn submit(
            &self,
            submission: &FeedbackSubmission,
        ) -> Result<SubmitResponse, BackendError> {
            self.calls.set(self.calls.get() + 1);
            self.submitted.borrow_mut().push(submission.clone());
            self.submit_responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transport("no response queued".to_string())))
        }

        async fn status(&self, _tracking_id: &str) -> Result<StatusLookup, BackendError> {
            self.calls.set(self.calls.get() + 1);
            self.status_responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transport("no response queued".to_string())))
        }

        async fn update_status(
            &self,
            _tracking_id: &str,
            _update: &StatusUpdate,
        ) -> Result<(), BackendError> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }

        fn has_credentials(&self) -> bool {
            self.token
        }
    }

    fn session(backend: FakeBackend) -> FeedbackSession<FakeBackend, MemoryStorage> {
        FeedbackSession::new(backend, MemoryStorage::new(), Taxonomy::builtin().unwrap())
    }

    fn draft() -> FeedbackDraft {
        FeedbackDraft {
            organization_id: "org-1".to_string(),
            feedback_type: "harassment".to_string(),
            category: "verbal_abuse".to_string(),
            description: "Ten+ char description".to_string(),
            severity: "high".to_string(),
            ..FeedbackDraft::default()
        }
    }

    /// Reads succeed, every write fails.
    #[derive(Default)]
    struct ReadOnlyStorage {
        inner: MemoryStorage,
    }

    impl ClientStorage for ReadOnlyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery))
        }

        fn remove_item(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery))
        }
    }

    fn accepted(id: &str) -> Result<SubmitResponse, BackendError> {
        Ok(SubmitResponse {
            success: Some(true),
            tracking_id: Some(id.to_string()),
            message: None,
            alternative_actions: Vec::new(),
        })
    }

    #[tokio::test]
    async fn successful_submission_shows_and_caches_tracking_id() {
        let mut session = session(FakeBackend::with_submit(accepted("ABC123")));

        let tracking_id = session.submit(&draft()).await.unwrap();

        assert_eq!(tracking_id, "ABC123");
        assert_eq!(
            session.submission_state(),
            &SubmissionState::Submitted {
                tracking_id: "ABC123".to_string()
            }
        );
        let cached = &session.cache().records()[0];
        assert_eq!(cached.tracking_id, "ABC123");
        assert_eq!(cached.category, "verbal_abuse");
        assert_eq!(cached.severity, Severity::High);
        assert_eq!(session.backend.submitted.borrow()[0].description, "Ten+ char description");
    }

    #[tokio::test]
    async fn invalid_draft_never_calls_backend() {
        let mut session = session(FakeBackend::with_submit(accepted("ABC123")));
        let mut input = draft();
        input.description = "short".to_string();

        let err = session.submit(&input).await.unwrap_err();

        assert!(
            matches!(err, FeedbackError::Validation(ref errors) if errors.has(Field::Description))
        );
        assert_eq!(session.backend.calls.get(), 0);
        assert!(session.cache().is_empty());
        assert!(matches!(session.submission_state(), SubmissionState::Failed { .. }));
    }

    #[tokio::test]
    async fn success_without_tracking_id_is_a_failure() {
        let mut session = session(FakeBackend::with_submit(Ok(SubmitResponse {
            success: Some(true),
            tracking_id: Some("  ".to_string()),
            message: None,
            alternative_actions: Vec::new(),
        })));

        let err = session.submit(&draft()).await.unwrap_err();

        assert!(matches!(err, FeedbackError::Api { .. }));
        assert!(session.cache().is_empty());
    }

    #[tokio::test]
    async fn rejection_carries_alternative_actions() {
        let mut session = session(FakeBackend::with_submit(Ok(SubmitResponse {
            success: Some(false),
            tracking_id: None,
            message: Some("Submissions are paused".to_string()),
            alternative_actions: vec!["Contact HR directly".to_string()],
        })));

        let err = session.submit(&draft()).await.unwrap_err();

        assert_eq!(err.to_string(), "Submissions are paused");
        assert_eq!(
            session.submission_state(),
            &SubmissionState::Failed {
                message: "Submissions are paused".to_string(),
                alternative_actions: vec!["Contact HR directly".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn transport_failure_is_a_network_error() {
        let mut session = session(FakeBackend::with_submit(Err(BackendError::Transport(
            "connection refused".to_string(),
        ))));

        let err = session.submit(&draft()).await.unwrap_err();

        assert!(matches!(err, FeedbackError::Network { .. }));
        assert!(session.cache().is_empty());
    }

    #[tokio::test]
    async fn cache_stays_bounded_across_submissions() {
        let backend = FakeBackend::default();
        for id in 0..12 {
            backend
                .submit_responses
                .borrow_mut()
                .push_back(accepted(&format!("T{id}")));
        }
        let mut session = session(backend);
        for _ in 0..12 {
            session.submit(&draft()).await.unwrap();
            session.reset_submission();
        }
        assert_eq!(session.cache().len(), MAX_TRACKED_IDS);
        assert_eq!(session.cache().records()[0].tracking_id, "T11");
        assert_eq!(session.submission_state(), &SubmissionState::Editing);
    }

    #[tokio::test]
    async fn blank_tracking_id_never_calls_backend() {
        let mut session = session(FakeBackend::default());

        let err = session.check_status("   ").await.unwrap_err();

        assert!(
            matches!(err, FeedbackError::Validation(ref errors) if errors.has(Field::TrackingId))
        );
        assert_eq!(session.backend.calls.get(), 0);
    }

    #[tokio::test]
    async fn unknown_tracking_id_is_not_found() {
        let mut session = session(FakeBackend::with_status(Ok(StatusLookup::NotFound)));

        let err = session.check_status("DOES-NOT-EXIST").await.unwrap_err();

        assert!(matches!(
            err,
            FeedbackError::NotFound { ref tracking_id } if tracking_id == "DOES-NOT-EXIST"
        ));
        assert_eq!(
            session.lookup_state(),
            &LookupState::NotFound {
                tracking_id: "DOES-NOT-EXIST".to_string()
            }
        );
    }

    #[tokio::test]
    async fn found_status_is_returned() {
        let status = FeedbackStatus {
            status: ReviewStatus::Investigating,
            severity: Some(Severity::High),
            category: Some("verbal_abuse".to_string()),
            submitted_at: Some("2026-10-01T08:00:00Z".to_string()),
            last_updated: Some("2026-10-02T08:00:00Z".to_string()),
            public_notes: None,
            next_steps: Some("Interviews scheduled".to_string()),
        };
        let backend = FakeBackend::with_status(Ok(StatusLookup::Found(status.clone())));
        let mut session = session(backend);

        let found = session.check_status(" ABC123 ").await.unwrap();

        assert_eq!(found, status);
        assert_eq!(
            session.lookup_state(),
            &LookupState::Found {
                tracking_id: "ABC123".to_string(),
                status,
            }
        );
    }

    #[tokio::test]
    async fn tracking_id_is_kept_exactly_as_issued() {
        let mut session = session(FakeBackend::with_submit(accepted(" ABC123 ")));

        let tracking_id = session.submit(&draft()).await.unwrap();

        assert_eq!(tracking_id, " ABC123 ");
        assert_eq!(session.cache().records()[0].tracking_id, " ABC123 ");
    }

    #[tokio::test]
    async fn tracking_id_without_success_flag_is_accepted() {
        let mut session = session(FakeBackend::with_submit(Ok(SubmitResponse {
            success: None,
            tracking_id: Some("ABC123".to_string()),
            message: None,
            alternative_actions: Vec::new(),
        })));

        assert_eq!(session.submit(&draft()).await.unwrap(), "ABC123");
        assert_eq!(session.cache().len(), 1);
    }

    #[tokio::test]
    async fn cache_write_failure_keeps_submission_successful() {
        let mut session = FeedbackSession::new(
            FakeBackend::with_submit(accepted("ABC123")),
            ReadOnlyStorage::default(),
            Taxonomy::builtin().unwrap(),
        );

        let tracking_id = session.submit(&draft()).await.unwrap();

        assert_eq!(tracking_id, "ABC123");
        assert_eq!(
            session.submission_state(),
            &SubmissionState::Submitted {
                tracking_id: "ABC123".to_string()
            }
        );
        assert_eq!(session.cache().records()[0].tracking_id, "ABC123");
        assert_eq!(session.cache().storage().get_item(TRACKING_IDS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn blank_status_update_never_calls_backend() {
        let mut session = session(FakeBackend {
            token: true,
            ..FakeBackend::default()
        });
        let update = StatusUpdate {
            status: ReviewStatus::Other("  ".to_string()),
            public_notes: None,
            next_steps: None,
        };

        let err = session.update_status("ABC123", &update).await.unwrap_err();

        assert!(matches!(err, FeedbackError::Validation(ref errors) if errors.has(Field::Status)));
        assert_eq!(session.backend.calls.get(), 0);
    }

    #[tokio::test]
    async fn update_requires_token() {
        let mut session = session(FakeBackend::default());
        let update = StatusUpdate {
            status: ReviewStatus::Resolved,
            public_notes: None,
            next_steps: None,
        };

        let err = session.update_status("ABC123", &update).await.unwrap_err();

        assert!(matches!(err, FeedbackError::Validation(ref errors) if errors.has(Field::Token)));
        assert_eq!(session.backend.calls.get(), 0);
    }
}
