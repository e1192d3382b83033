//! Ollama `/api/generate` request/response types.
//!
//! Streaming responses are one [`ResponseChunk`] per line; the last one has
//! `done: true` and carries the timing/count metadata. Non-streaming responses
//! are a single [`GenerateResponse`] with the whole text in `response`.
//!
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion>

use serde::{Deserialize, Serialize};

/// Ollama `/api/generate` request body.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "llama2:7b-chat-q4_0").
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Whether the server should stream NDJSON chunks.
    pub stream: bool,
    /// Generation options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
    /// How long to keep the model loaded in memory (e.g. "5m", "0").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// Sampling options sent as the `options` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateOptions {
    /// Sampling temperature (0.0 - 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    /// Top-p (nucleus sampling).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl GenerateOptions {
    /// Options with only the temperature set.
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }

    /// True when no field is set, in which case the `options` object is omitted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One line of a streaming `/api/generate` response.
///
/// Only `done` is required to be meaningful on every line. The metadata
/// fields are read from the terminal chunk and ignored elsewhere.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseChunk {
    /// Fragment text.
    #[serde(default)]
    pub response: Option<String>,
    /// Set on the final chunk of the stream.
    #[serde(default)]
    pub done: bool,
    /// Model that generated the response.
    #[serde(default)]
    pub model: Option<String>,
    /// Why generation stopped (e.g. "stop", "length").
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Number of tokens generated.
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Total time spent on the request in nanoseconds.
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Time spent loading the model in nanoseconds.
    #[serde(default)]
    pub load_duration: Option<u64>,
    /// Time spent generating the response in nanoseconds.
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// Non-streaming `/api/generate` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// The complete generated text.
    pub response: String,
    /// Model that generated the response.
    #[serde(default)]
    pub model: Option<String>,
    /// Why generation stopped.
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Number of tokens generated.
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Total time spent on the request in nanoseconds.
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Time spent loading the model in nanoseconds.
    #[serde(default)]
    pub load_duration: Option<u64>,
    /// Time spent generating the response in nanoseconds.
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// The assembled outcome of one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamResult {
    /// All fragments concatenated in arrival order.
    pub full_text: String,
    /// Number of tokens generated.
    pub eval_count: Option<u64>,
    /// Total request duration in nanoseconds.
    pub total_duration_nanos: Option<u64>,
    /// Model that generated the response.
    pub model: Option<String>,
    /// Why generation stopped.
    pub done_reason: Option<String>,
    /// Number of tokens in the prompt.
    pub prompt_eval_count: Option<u64>,
    /// Model load time in nanoseconds.
    pub load_duration_nanos: Option<u64>,
    /// Generation time in nanoseconds.
    pub eval_duration_nanos: Option<u64>,
}

impl StreamResult {
    /// A result carrying only text, with every metadata field absent.
    pub fn text_only(full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            ..Default::default()
        }
    }

    /// Build a result from accumulated text and the terminal chunk's metadata.
    pub(crate) fn from_terminal(full_text: String, chunk: ResponseChunk) -> Self {
        Self {
            full_text,
            eval_count: chunk.eval_count,
            total_duration_nanos: chunk.total_duration,
            model: chunk.model,
            done_reason: chunk.done_reason,
            prompt_eval_count: chunk.prompt_eval_count,
            load_duration_nanos: chunk.load_duration,
            eval_duration_nanos: chunk.eval_duration,
        }
    }

    /// Generated tokens per second over the whole request.
    ///
    /// `None` when either the count or the duration is missing, or the
    /// duration is zero.
    pub fn tokens_per_second(&self) -> Option<f64> {
        let count = self.eval_count?;
        let nanos = self.total_duration_nanos?;
        if nanos == 0 {
            return None;
        }
        Some(count as f64 / (nanos as f64 / 1e9))
    }
}

impl From<GenerateResponse> for StreamResult {
    fn from(resp: GenerateResponse) -> Self {
        Self {
            full_text: resp.response,
            eval_count: resp.eval_count,
            total_duration_nanos: resp.total_duration,
            model: resp.model,
            done_reason: resp.done_reason,
            prompt_eval_count: resp.prompt_eval_count,
            load_duration_nanos: resp.load_duration,
            eval_duration_nanos: resp.eval_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_optionals() {
        let req = GenerateRequest {
            model: "llama2".into(),
            prompt: "hi".into(),
            stream: true,
            options: None,
            keep_alive: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"model": "llama2", "prompt": "hi", "stream": true}));
    }

    #[test]
    fn request_serializes_temperature_only() {
        let req = GenerateRequest {
            model: "llama2".into(),
            prompt: "hi".into(),
            stream: false,
            options: Some(GenerateOptions::with_temperature(0.7)),
            keep_alive: Some("5m".into()),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["options"], json!({"temperature": 0.7}));
        assert_eq!(value["keep_alive"], "5m");
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn default_options_are_empty() {
        assert!(GenerateOptions::default().is_empty());
        assert!(!GenerateOptions::with_temperature(0.1).is_empty());
    }

    #[test]
    fn chunk_without_done_defaults_to_false() {
        let chunk: ResponseChunk = serde_json::from_str(r#"{"response":"Hel"}"#).unwrap();
        assert_eq!(chunk.response.as_deref(), Some("Hel"));
        assert!(!chunk.done);
        assert!(chunk.eval_count.is_none());
    }

    #[test]
    fn chunk_rejects_wrong_field_type() {
        let err = serde_json::from_str::<ResponseChunk>(r#"{"done":"yes"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn chunk_rejects_non_object() {
        assert!(serde_json::from_str::<ResponseChunk>("42").is_err());
        assert!(serde_json::from_str::<ResponseChunk>(r#""text""#).is_err());
    }

    #[test]
    fn chunk_ignores_unknown_fields() {
        let chunk: ResponseChunk =
            serde_json::from_str(r#"{"response":"x","done":false,"context":[1,2,3]}"#).unwrap();
        assert_eq!(chunk.response.as_deref(), Some("x"));
    }

    #[test]
    fn generate_response_converts_to_stream_result() {
        let resp: GenerateResponse = serde_json::from_value(json!({
            "model": "llama2",
            "response": "Hello!",
            "done": true,
            "eval_count": 5,
            "prompt_eval_count": 10,
            "total_duration": 500_000_000_u64,
            "load_duration": 100_000_000_u64,
        }))
        .unwrap();
        let result = StreamResult::from(resp);
        assert_eq!(result.full_text, "Hello!");
        assert_eq!(result.eval_count, Some(5));
        assert_eq!(result.prompt_eval_count, Some(10));
        assert_eq!(result.total_duration_nanos, Some(500_000_000));
        assert_eq!(result.load_duration_nanos, Some(100_000_000));
        assert!(result.eval_duration_nanos.is_none());
        assert_eq!(result.model.as_deref(), Some("llama2"));
    }

    #[test]
    fn generate_response_requires_text() {
        let err = serde_json::from_value::<GenerateResponse>(json!({"done": true}));
        assert!(err.is_err());
    }

    #[test]
    fn tokens_per_second_from_count_and_duration() {
        let result = StreamResult {
            eval_count: Some(50),
            total_duration_nanos: Some(2_000_000_000),
            ..Default::default()
        };
        let tps = result.tokens_per_second().unwrap();
        assert!((tps - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tokens_per_second_absent_without_metadata() {
        assert!(StreamResult::text_only("x").tokens_per_second().is_none());
        let zero = StreamResult {
            eval_count: Some(3),
            total_duration_nanos: Some(0),
            ..Default::default()
        };
        assert!(zero.tokens_per_second().is_none());
    }
}
