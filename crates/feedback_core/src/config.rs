use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub client: LocalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Bearer token for reviewer-side status updates.
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub organization_id: Option<String>,
    pub storage_path: PathBuf,
    pub taxonomy_path: Option<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            organization_id: None,
            storage_path: PathBuf::from("feedback_client.db"),
            taxonomy_path: None,
        }
    }
}

impl ClientConfig {
    /// Reads the TOML file at `path` (defaults when it does not exist),
    /// then applies `FEEDBACK_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?
        } else {
            info!("{} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("FEEDBACK_API_URL") {
            info!("FEEDBACK_API_URL set, using {url}");
            self.api.base_url = url;
        }
        if let Some(token) = var("FEEDBACK_API_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(org) = var("FEEDBACK_ORG_ID") {
            self.client.organization_id = Some(org);
        }
        if self.api.timeout_ms == 0 {
            warn!("api.timeout_ms of 0 is invalid, using {DEFAULT_TIMEOUT_MS}");
            self.api.timeout_ms = DEFAULT_TIMEOUT_MS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            [api]
            base_url = "https://hr.example.com"

            [client]
            organization_id = "org-42"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://hr.example.com");
        assert_eq!(config.api.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.client.organization_id.as_deref(), Some("org-42"));
        assert_eq!(config.client.storage_path, PathBuf::from("feedback_client.db"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ClientConfig::from_toml("[api]\ntimeout_ms = 0\n").unwrap();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FEEDBACK_API_URL", "http://127.0.0.1:9000"),
            ("FEEDBACK_API_TOKEN", "secret"),
        ]);
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.api.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.client.organization_id, None);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(!config.api.base_url.is_empty());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.toml");
        fs::write(&path, "[api\nbase_url = ").unwrap();
        assert!(ClientConfig::load(&path).is_err());
    }
}
