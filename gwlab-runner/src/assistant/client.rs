//! HTTP text generator — blocking POSTs to the collaborator's routes.
//!
//! One attempt per call with an explicit timeout. The caller decides what to
//! do with a failure; nothing here retries.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{AssistantError, Route, TextGenerator};

const CLIENT_KEY_HEADER: &str = "X-Client-Key";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    candidates: Vec<EnvelopeCandidate>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeCandidate {
    content: EnvelopeContent,
}

#[derive(Debug, Deserialize)]
struct EnvelopeContent {
    #[serde(default)]
    parts: Vec<EnvelopePart>,
}

#[derive(Debug, Deserialize)]
struct EnvelopePart {
    text: Option<String>,
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
pub fn extract_text(body: &str) -> Result<String, AssistantError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        AssistantError::MalformedResponse(format!("response is not an envelope: {e}"))
    })?;
    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| AssistantError::MalformedResponse("envelope has no text part".into()))
}

/// [`TextGenerator`] backed by `reqwest`'s blocking client.
pub struct HttpTextGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    client_key: String,
}

impl HttpTextGenerator {
    pub fn new(
        base_url: impl Into<String>,
        client_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AssistantError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(AssistantError::Config("base URL is empty".into()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_key: client_key.into(),
        })
    }

    pub fn url_for(&self, route: Route) -> String {
        format!("{}/{}", self.base_url, route.path())
    }
}

impl TextGenerator for HttpTextGenerator {
    fn generate(&self, route: Route, body: &Value) -> Result<String, AssistantError> {
        let url = self.url_for(route);
        debug!(%url, "assistant request");

        let resp = self
            .client
            .post(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .json(body)
            .send()
            .map_err(|e| AssistantError::Network {
                route,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AssistantError::Status {
                route,
                status: status.as_u16(),
            });
        }

        let text = resp.text().map_err(|e| AssistantError::Network {
            route,
            message: e.to_string(),
        })?;
        extract_text(&text)
    }
}
