use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "Low - minor concern",
            Severity::Medium => "Medium - needs attention",
            Severity::High => "High - serious issue",
            Severity::Critical => "Critical - immediate action required",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "severity must be one of low, medium, high, critical (got '{other}')"
            )),
        }
    }
}

/// Review state reported by the feedback service.
///
/// Statuses the client does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReviewStatus {
    PendingReview,
    Investigating,
    Resolved,
    Closed,
    Escalated,
    RequiresMoreInfo,
    Other(String),
}

impl ReviewStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ReviewStatus::PendingReview => "pending_review",
            ReviewStatus::Investigating => "investigating",
            ReviewStatus::Resolved => "resolved",
            ReviewStatus::Closed => "closed",
            ReviewStatus::Escalated => "escalated",
            ReviewStatus::RequiresMoreInfo => "requires_more_info",
            ReviewStatus::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ReviewStatus::PendingReview => "Pending review",
            ReviewStatus::Investigating => "Under investigation",
            ReviewStatus::Resolved => "Resolved",
            ReviewStatus::Closed => "Closed",
            ReviewStatus::Escalated => "Escalated",
            ReviewStatus::RequiresMoreInfo => "More information required",
            ReviewStatus::Other(value) => value,
        }
    }

    /// Resolved and closed reports receive no further updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Resolved | ReviewStatus::Closed)
    }
}

impl JsonSchema for ReviewStatus {
    fn schema_name() -> String {
        "ReviewStatus".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        <String as JsonSchema>::json_schema(generator)
    }
}

impl From<String> for ReviewStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending_review" => ReviewStatus::PendingReview,
            "investigating" => ReviewStatus::Investigating,
            "resolved" => ReviewStatus::Resolved,
            "closed" => ReviewStatus::Closed,
            "escalated" => ReviewStatus::Escalated,
            "requires_more_info" => ReviewStatus::RequiresMoreInfo,
            _ => ReviewStatus::Other(value),
        }
    }
}

impl From<ReviewStatus> for String {
    fn from(value: ReviewStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw form input, before validation.
#[derive(Debug, Clone, Default)]
pub struct FeedbackDraft {
    pub organization_id: String,
    pub feedback_type: String,
    pub category: String,
    pub description: String,
    pub severity: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub evidence_urls: Vec<String>,
    pub incident_date: Option<String>,
}

/// A validated submission, as posted to the feedback service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackSubmission {
    pub organization_id: String,
    pub feedback_type: String,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub evidence_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_date: Option<String>, // YYYY-MM-DD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitResponse {
    /// Absent on services that only answer with a tracking ID.
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub alternative_actions: Vec<String>,
}

/// Local cache entry for a tracking ID issued by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TrackingRecord {
    pub tracking_id: String,
    pub submitted_at: String, // RFC 3339, UTC
    pub category: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackStatus {
    pub status: ReviewStatus,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
    /// Absent `found` is inferred from whether a status was returned.
    #[serde(default)]
    pub found: Option<bool>,
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub public_notes: Option<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
}

impl StatusResponse {
    /// `None` when the service reported no match. A response without a
    /// status that does not say `found: false` is malformed.
    pub fn into_status(self) -> Option<Result<FeedbackStatus, String>> {
        if self.found == Some(false) {
            return None;
        }
        let Some(status) = self.status else {
            return Some(Err("status response is missing the status field".to_string()));
        };
        Some(Ok(FeedbackStatus {
            status,
            severity: self.severity,
            category: self.category,
            submitted_at: self.submitted_at,
            last_updated: self.last_updated,
            public_notes: self.public_notes,
            next_steps: self.next_steps,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusLookup {
    Found(FeedbackStatus),
    NotFound,
}

/// Reviewer-side status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusUpdate {
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}
