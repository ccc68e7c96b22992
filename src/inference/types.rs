//! Shared types for the inference client.
//!
//! These mirror the Text Generation Inference `/generate` and
//! `/generate_stream` wire formats, used for both request building and
//! response parsing.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// Generation parameters. Unset fields are omitted so the server applies its
/// own defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Ask for generation details (finish reason, token count).
    pub details: bool,
}

impl GenerateParameters {
    /// Parameters with only a token budget set.
    pub fn with_max_new_tokens(max_new_tokens: u32) -> Self {
        Self {
            max_new_tokens: Some(max_new_tokens),
            ..Self::default()
        }
    }
}

/// Request body for `POST /generate` and `POST /generate_stream`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub inputs: String,
    pub parameters: GenerateParameters,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A generated token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Token {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub logprob: Option<f32>,
    /// Special tokens (EOS, BOS, padding) are not part of the answer text.
    #[serde(default)]
    pub special: bool,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Length,
    EosToken,
    StopSequence,
}

/// Generation summary returned when `details` is requested.
#[derive(Debug, Clone, Deserialize)]
pub struct Details {
    pub finish_reason: FinishReason,
    pub generated_tokens: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Response body for `POST /generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub generated_text: String,
    #[serde(default)]
    pub details: Option<Details>,
}

/// `/generate` returns an object; the compat route `/` wraps it in an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GenerateResponseBody {
    Single(GenerateResponse),
    Batch(Vec<GenerateResponse>),
}

/// One event from `POST /generate_stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamResponse {
    pub token: Token,
    /// Full text, present on the final event only.
    #[serde(default)]
    pub generated_text: Option<String>,
    #[serde(default)]
    pub details: Option<Details>,
}

/// Structured error body (`{"error": ..., "error_type": ...}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_parameters_omitted() {
        let req = GenerateRequest {
            inputs: "### Task".to_string(),
            parameters: GenerateParameters::with_max_new_tokens(1024),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["inputs"], "### Task");
        assert_eq!(json["parameters"]["max_new_tokens"], 1024);
        assert!(json["parameters"].get("temperature").is_none());
        assert!(json["parameters"].get("stop").is_none());
        assert_eq!(json["parameters"]["details"], false);
    }

    #[test]
    fn test_stop_sequences_serialized_when_set() {
        let params = GenerateParameters {
            stop: vec![";".into()],
            ..GenerateParameters::default()
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["stop"], serde_json::json!([";"]));
    }

    #[test]
    fn test_stream_response_final_event() {
        let body = r#"{
            "index": 12,
            "token": {"id": 2, "text": "</s>", "logprob": -0.01, "special": true},
            "generated_text": "SELECT COUNT(*) FROM salespeople;",
            "details": {"finish_reason": "eos_token", "generated_tokens": 12, "seed": null}
        }"#;
        let event: StreamResponse = serde_json::from_str(body).unwrap();
        assert!(event.token.special);
        assert_eq!(
            event.generated_text.as_deref(),
            Some("SELECT COUNT(*) FROM salespeople;")
        );
        assert_eq!(event.details.unwrap().finish_reason, FinishReason::EosToken);
    }

    #[test]
    fn test_generate_body_single_or_batch() {
        let single: GenerateResponseBody =
            serde_json::from_str(r#"{"generated_text": "SELECT 1;"}"#).unwrap();
        assert!(matches!(single, GenerateResponseBody::Single(r) if r.generated_text == "SELECT 1;"));

        let batch: GenerateResponseBody =
            serde_json::from_str(r#"[{"generated_text": "SELECT 2;"}]"#).unwrap();
        assert!(matches!(batch, GenerateResponseBody::Batch(v) if v.len() == 1));
    }
}
