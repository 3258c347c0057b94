use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const DEFAULT_TAXONOMY: &str = include_str!("../taxonomy/default.yaml");

/// Feedback type -> category table offered by the submission form.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    types: BTreeMap<String, FeedbackType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackType {
    pub label: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TaxonomyFile {
    feedback_types: BTreeMap<String, FeedbackType>,
}

impl Taxonomy {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_TAXONOMY).context("built-in taxonomy is invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading taxonomy {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing taxonomy {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let parsed: TaxonomyFile = serde_yaml::from_str(raw)?;
        if parsed.feedback_types.is_empty() {
            return Err(anyhow!("taxonomy defines no feedback types"));
        }
        for (name, entry) in &parsed.feedback_types {
            if entry.categories.is_empty() {
                return Err(anyhow!("feedback type {name} has no categories"));
            }
        }
        Ok(Self {
            types: parsed.feedback_types,
        })
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, &FeedbackType)> {
        self.types.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn contains_type(&self, feedback_type: &str) -> bool {
        self.types.contains_key(feedback_type)
    }

    pub fn categories(&self, feedback_type: &str) -> Option<&[String]> {
        self.types
            .get(feedback_type)
            .map(|entry| entry.categories.as_slice())
    }

    pub fn contains_category(&self, feedback_type: &str, category: &str) -> bool {
        self.categories(feedback_type)
            .is_some_and(|categories| categories.iter().any(|value| value == category))
    }
}
