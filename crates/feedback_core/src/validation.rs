use time::Date;
use time::macros::format_description;

use crate::error::{Field, ValidationErrors};
use crate::schema::{FeedbackDraft, FeedbackSubmission, ReviewStatus, Severity};
use crate::taxonomy::Taxonomy;

pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// Checks a draft and builds the submission that will be posted.
///
/// Every failing field is reported, not just the first one.
pub fn validate_submission(
    draft: &FeedbackDraft,
    taxonomy: &Taxonomy,
) -> Result<FeedbackSubmission, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let organization_id = draft.organization_id.trim();
    if organization_id.is_empty() {
        errors.push(Field::OrganizationId, "organization is required");
    }

    let feedback_type = draft.feedback_type.trim();
    if feedback_type.is_empty() {
        errors.push(Field::FeedbackType, "feedback type is required");
    } else if !taxonomy.contains_type(feedback_type) {
        errors.push(
            Field::FeedbackType,
            format!("unknown feedback type '{feedback_type}'"),
        );
    }

    let category = draft.category.trim();
    if category.is_empty() {
        errors.push(Field::Category, "category is required");
    } else if taxonomy.contains_type(feedback_type)
        && !taxonomy.contains_category(feedback_type, category)
    {
        errors.push(
            Field::Category,
            format!("category '{category}' does not belong to feedback type '{feedback_type}'"),
        );
    }

    let description = draft.description.trim();
    if description.is_empty() {
        errors.push(Field::Description, "description is required");
    } else if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.push(
            Field::Description,
            format!("description must be at least {MIN_DESCRIPTION_CHARS} characters"),
        );
    }

    let severity = if draft.severity.trim().is_empty() {
        errors.push(Field::Severity, "severity is required");
        None
    } else {
        match draft.severity.parse::<Severity>() {
            Ok(severity) => Some(severity),
            Err(message) => {
                errors.push(Field::Severity, message);
                None
            }
        }
    };

    let mut evidence_urls = Vec::new();
    for url in draft.evidence_urls.iter().map(|url| url.trim()) {
        if url.is_empty() {
            continue;
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(
                Field::EvidenceUrls,
                format!("'{url}' must be an http:// or https:// link"),
            );
            continue;
        }
        evidence_urls.push(url.to_string());
    }

    let incident_date = non_blank(&draft.incident_date);
    if let Some(date) = &incident_date {
        if Date::parse(date, format_description!("[year]-[month]-[day]")).is_err() {
            errors.push(Field::IncidentDate, "incident date must be YYYY-MM-DD");
        }
    }

    match severity {
        Some(severity) if errors.is_empty() => Ok(FeedbackSubmission {
            organization_id: organization_id.to_string(),
            feedback_type: feedback_type.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            severity,
            target_type: non_blank(&draft.target_type),
            target_id: non_blank(&draft.target_id),
            evidence_urls,
            incident_date,
        }),
        _ => Err(errors),
    }
}

/// Trims a tracking ID typed by the user. Empty input is rejected.
pub fn normalize_tracking_id(raw: &str) -> Result<String, ValidationErrors> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationErrors::single(
            Field::TrackingId,
            "please enter a tracking ID",
        ));
    }
    Ok(trimmed.to_string())
}

/// Parses a reviewer-entered status. Blank input is rejected; unknown
/// names pass through as [`ReviewStatus::Other`].
pub fn normalize_review_status(raw: &str) -> Result<ReviewStatus, ValidationErrors> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationErrors::single(Field::Status, "please enter a status"));
    }
    Ok(ReviewStatus::from(trimmed.to_string()))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
