use std::time::Duration;

use feedback_core::config::ApiConfig;
use feedback_core::error::BackendError;
use feedback_core::lifecycle::FeedbackBackend;
use feedback_core::schema::{
    FeedbackSubmission, StatusLookup, StatusResponse, StatusUpdate, SubmitResponse,
};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

const FEEDBACK_PATH: [&str; 3] = ["api", "v1", "anonymous-feedback"];

/// [`FeedbackBackend`] over the service's REST API.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            BackendError::Transport(format!("invalid base URL {}: {err}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "invalid base URL {}",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|token| !token.trim().is_empty()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(FEEDBACK_PATH).extend(segments);
        }
        url
    }
}

impl FeedbackBackend for HttpBackend {
    async fn submit(
        &self,
        submission: &FeedbackSubmission,
    ) -> Result<SubmitResponse, BackendError> {
        let url = self.endpoint(&[]);
        debug!(%url, "POST feedback");
        let response = self
            .client
            .post(url)
            .json(submission)
            .send()
            .await
            .map_err(transport)?;
        let response = error_for_status(response).await?;
        decode(response).await
    }

    async fn status(&self, tracking_id: &str) -> Result<StatusLookup, BackendError> {
        let url = self.endpoint(&["status", tracking_id]);
        debug!(%url, "GET feedback status");
        let response = self.client.get(url).send().await.map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(StatusLookup::NotFound);
        }
        let response = error_for_status(response).await?;
        let body: StatusResponse = decode(response).await?;
        match body.into_status() {
            None => Ok(StatusLookup::NotFound),
            Some(Ok(status)) => Ok(StatusLookup::Found(status)),
            Some(Err(message)) => Err(BackendError::Decode(message)),
        }
    }

    async fn update_status(
        &self,
        tracking_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&[tracking_id, "status"]);
        debug!(%url, "PUT feedback status");
        let mut request = self.client.put(url).json(update);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport)?;
        error_for_status(response).await?;
        Ok(())
    }

    fn has_credentials(&self) -> bool {
        self.token.is_some()
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
}

async fn error_for_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Http {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

/// Server-supplied message from a `detail` or `message` field, falling
/// back to the HTTP reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message"].iter().find_map(|key| {
                value
                    .get(key)
                    .and_then(|field| field.as_str())
                    .map(str::to_string)
            })
        })
        .filter(|message| !message.trim().is_empty());
    from_body.unwrap_or_else(|| {
        format!(
            "The feedback service responded with {} {}.",
            status.as_u16(),
            status.canonical_reason().unwrap_or("error")
        )
    })
}
