use std::fmt;

use thiserror::Error;

/// Form field a validation message is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    OrganizationId,
    FeedbackType,
    Category,
    Description,
    Severity,
    EvidenceUrls,
    IncidentDate,
    TrackingId,
    Status,
    Token,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::OrganizationId => "organization_id",
            Field::FeedbackType => "feedback_type",
            Field::Category => "category",
            Field::Description => "description",
            Field::Severity => "severity",
            Field::EvidenceUrls => "evidence_urls",
            Field::IncidentDate => "incident_date",
            Field::TrackingId => "tracking_id",
            Field::Status => "status",
            Field::Token => "token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: Field) -> bool {
        self.0.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|error| format!("{}: {}", error.field.as_str(), error.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Failure reported by a [`crate::lifecycle::FeedbackBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced to the user. Every variant ends the current operation.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Please fix the following: {0}")]
    Validation(ValidationErrors),

    #[error("No feedback found for tracking ID {tracking_id}. Please check the ID and try again.")]
    NotFound { tracking_id: String },

    #[error("{message}")]
    Api {
        status: Option<u16>,
        message: String,
        alternative_actions: Vec<String>,
    },

    #[error("Unable to reach the feedback service. Please check your connection and try again.")]
    Network { detail: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FeedbackError {
    pub fn validation(field: Field, message: impl Into<String>) -> Self {
        FeedbackError::Validation(ValidationErrors::single(field, message))
    }

    pub fn alternative_actions(&self) -> &[String] {
        match self {
            FeedbackError::Api {
                alternative_actions,
                ..
            } => alternative_actions,
            _ => &[],
        }
    }
}

impl From<BackendError> for FeedbackError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(detail) => FeedbackError::Network { detail },
            BackendError::Http { status, message } => FeedbackError::Api {
                status: Some(status),
                message,
                alternative_actions: Vec::new(),
            },
            BackendError::Decode(detail) => FeedbackError::Api {
                status: None,
                message: format!(
                    "The feedback service returned an unexpected response ({detail})."
                ),
                alternative_actions: Vec::new(),
            },
        }
    }
}
