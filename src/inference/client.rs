//! Text Generation Inference HTTP client.
//!
//! Sends completion requests to the local TGI server, either waiting for the
//! full text or streaming tokens back as Server-Sent Events. No retries: a
//! failed call is surfaced to the caller as-is.

use std::time::Duration;

use futures::Stream;
use reqwest::Client as HttpClient;

use super::errors::{InferenceError, ServerErrorKind};
use super::streaming::parse_sse_stream;
use super::types::{
    ErrorResponse, GenerateParameters, GenerateRequest, GenerateResponse, GenerateResponseBody,
    StreamResponse,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the `/health` probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

// ─── TgiClient ───────────────────────────────────────────────────────────────

/// Client for a running TGI server.
///
/// Cheap to clone; clones share the underlying connection pools.
#[derive(Debug, Clone)]
pub struct TgiClient {
    /// HTTP client for non-streaming requests.
    http: HttpClient,
    /// HTTP client for streaming requests (longer total timeout).
    http_stream: HttpClient,
    base_url: String,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl TgiClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8000`).
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        stream_timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| InferenceError::ClientSetup {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(stream_timeout)
            .build()
            .map_err(|e| InferenceError::ClientSetup {
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_stream,
            base_url,
            request_timeout,
            stream_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ─── Completion (blocking) ───────────────────────────────────────────

    /// Generate the full completion for `prompt`.
    pub async fn generate(
        &self,
        prompt: &str,
        parameters: GenerateParameters,
    ) -> Result<GenerateResponse, InferenceError> {
        let url = format!("{}/generate", self.base_url);
        let body = GenerateRequest {
            inputs: prompt.to_string(),
            parameters,
        };

        tracing::debug!(
            url = %url,
            prompt_chars = body.inputs.len(),
            max_new_tokens = ?body.parameters.max_new_tokens,
            "sending generate request"
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(&url, self.request_timeout.as_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), body_text));
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::from_reqwest(&url, self.request_timeout.as_secs(), e))?;

        let parsed: GenerateResponseBody =
            serde_json::from_str(&body_text).map_err(|e| InferenceError::DecodeError {
                reason: format!("{e} (body: {body_text})"),
            })?;

        match parsed {
            GenerateResponseBody::Single(response) => Ok(response),
            GenerateResponseBody::Batch(responses) => {
                responses
                    .into_iter()
                    .next()
                    .ok_or_else(|| InferenceError::DecodeError {
                        reason: "empty response array".into(),
                    })
            }
        }
    }

    // ─── Completion (streaming) ──────────────────────────────────────────

    /// Stream the completion for `prompt` token by token.
    ///
    /// Connection and status errors are returned before the stream starts;
    /// errors after that arrive as stream items.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        parameters: GenerateParameters,
    ) -> Result<
        impl Stream<Item = Result<StreamResponse, InferenceError>> + Send + 'static,
        InferenceError,
    > {
        let url = format!("{}/generate_stream", self.base_url);
        let body = GenerateRequest {
            inputs: prompt.to_string(),
            parameters,
        };

        tracing::debug!(
            url = %url,
            prompt_chars = body.inputs.len(),
            max_new_tokens = ?body.parameters.max_new_tokens,
            "sending generate_stream request"
        );

        let response = self
            .http_stream
            .post(&url)
            .json(&body)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(&url, self.stream_timeout.as_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), body_text));
        }

        Ok(parse_sse_stream(response))
    }

    // ─── Health Check ────────────────────────────────────────────────────

    /// Whether the server reports a loaded, healthy model.
    ///
    /// A connection failure is `Ok(false)`, not an error.
    pub async fn health_check(&self) -> Result<bool, InferenceError> {
        let url = format!("{}/health", self.base_url);

        match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Build the error for a non-2xx response.
fn error_from_status(status: u16, body: String) -> InferenceError {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error) => InferenceError::ServerError {
            status: Some(status),
            kind: ServerErrorKind::classify(error.error_type.as_deref(), Some(status)),
            message: error.error,
        },
        Err(_) => InferenceError::HttpError { status, body },
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
