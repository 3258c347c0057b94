//! Anonymous feedback client: data model, validation, local tracking-ID
//! cache and the submission/status lifecycle.

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod schema;
pub mod taxonomy;
pub mod validation;

pub use error::{BackendError, FeedbackError, StorageError};
pub use lifecycle::{FeedbackBackend, FeedbackSession, LookupState, SubmissionState};
