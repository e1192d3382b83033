//! Errors from generation requests and the NDJSON reader.

use thiserror::Error;

use crate::types::StreamResult;

/// Errors from a generate call or from reading its response body.
///
/// Kinds that occur after text started arriving carry the text accumulated
/// so far, so callers can still show partial output.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The server answered with a non-success HTTP status.
    #[error("request failed with HTTP {status}: {body}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body, read as plain text.
        body: String,
    },

    /// A line of the body was not a valid response chunk.
    #[error("malformed chunk {line:?}: {source}")]
    MalformedChunk {
        /// The offending line.
        line: String,
        /// Text accumulated before the bad line.
        partial: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The body ended before a chunk with `done: true`.
    #[error("stream ended before the final chunk ({} bytes of text received)", .partial.len())]
    IncompleteStream {
        /// Text accumulated before the stream closed.
        partial: String,
    },

    /// Connection or I/O failure before any response data arrived.
    #[error("transport error: {0}")]
    TransportError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GenerateError {
    /// Text received before the failure, for kinds that carry it.
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            GenerateError::MalformedChunk { partial, .. }
            | GenerateError::IncompleteStream { partial } => Some(partial),
            _ => None,
        }
    }

    /// Whether the caller can treat this as a result with missing metadata.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GenerateError::IncompleteStream { .. })
    }

    /// Whether sending the same request again might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerateError::TransportError(_) => true,
            GenerateError::RequestFailed { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Short name of the error kind, for one-line diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::RequestFailed { .. } => "RequestFailed",
            GenerateError::MalformedChunk { .. } => "MalformedChunk",
            GenerateError::IncompleteStream { .. } => "IncompleteStream",
            GenerateError::TransportError(_) => "TransportError",
        }
    }

    /// Turn an [`IncompleteStream`](GenerateError::IncompleteStream) into a
    /// text-only [`StreamResult`]; every other kind is returned unchanged.
    pub fn recover(self) -> Result<StreamResult, GenerateError> {
        match self {
            GenerateError::IncompleteStream { partial } => Ok(StreamResult::text_only(partial)),
            other => Err(other),
        }
    }
}

/// Map a [`reqwest::Error`] to a [`GenerateError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> GenerateError {
    GenerateError::TransportError(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("not-json").unwrap_err()
    }

    #[test]
    fn display_includes_status_and_body() {
        let err = GenerateError::RequestFailed {
            status: 404,
            body: "model 'foo' not found".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"), "expected status in message: {msg}");
        assert!(msg.contains("model 'foo' not found"), "expected body in message: {msg}");
    }

    #[test]
    fn display_malformed_names_line() {
        let err = GenerateError::MalformedChunk {
            line: "not-json".into(),
            partial: String::new(),
            source: json_error(),
        };
        assert!(err.to_string().contains("not-json"));
    }

    #[test]
    fn partial_text_only_for_stream_kinds() {
        let incomplete = GenerateError::IncompleteStream {
            partial: "Hel".into(),
        };
        assert_eq!(incomplete.partial_text(), Some("Hel"));

        let malformed = GenerateError::MalformedChunk {
            line: "x".into(),
            partial: "lo".into(),
            source: json_error(),
        };
        assert_eq!(malformed.partial_text(), Some("lo"));

        let failed = GenerateError::RequestFailed {
            status: 500,
            body: String::new(),
        };
        assert!(failed.partial_text().is_none());
    }

    #[test]
    fn only_incomplete_is_recoverable() {
        assert!(GenerateError::IncompleteStream { partial: String::new() }.is_recoverable());
        assert!(
            !GenerateError::RequestFailed {
                status: 500,
                body: String::new()
            }
            .is_recoverable()
        );
        assert!(!GenerateError::TransportError("reset".into()).is_recoverable());
    }

    #[test]
    fn recover_keeps_text_and_drops_metadata() {
        let result = GenerateError::IncompleteStream {
            partial: "partial answer".into(),
        }
        .recover()
        .unwrap();
        assert_eq!(result.full_text, "partial answer");
        assert!(result.eval_count.is_none());
        assert!(result.total_duration_nanos.is_none());
    }

    #[test]
    fn recover_passes_other_kinds_through() {
        let err = GenerateError::RequestFailed {
            status: 400,
            body: "bad".into(),
        }
        .recover()
        .unwrap_err();
        assert!(matches!(err, GenerateError::RequestFailed { status: 400, .. }));
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = GenerateError::RequestFailed {
            status: 503,
            body: "unavailable".into(),
        };
        assert!(err.is_retryable());
        assert!(GenerateError::TransportError("refused".into()).is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = GenerateError::RequestFailed {
            status: 404,
            body: "not found".into(),
        };
        assert!(!err.is_retryable());
        assert!(!GenerateError::IncompleteStream { partial: String::new() }.is_retryable());
    }

    #[test]
    fn kind_names() {
        assert_eq!(
            GenerateError::IncompleteStream { partial: String::new() }.kind(),
            "IncompleteStream"
        );
        assert_eq!(GenerateError::TransportError("x".into()).kind(), "TransportError");
    }
}
