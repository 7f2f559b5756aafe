// src/core/error.rs

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Every way a call against the scanning engine, or a run built on such
/// calls, can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed caller input. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network-level failure on one attempt (connect, timeout, reset).
    #[error("transport failure on {action}: {message}")]
    TransientTransport { action: &'static str, message: String },

    /// The engine answered with a non-success HTTP status.
    #[error("engine answered {action} with HTTP {status}: {body}")]
    NonSuccessResponse { action: &'static str, status: u16, body: String },

    /// The retry budget ran out; `last` is the final failure observed.
    #[error("{action} failed after {attempts} attempt(s): {last}")]
    ExhaustedRetries {
        action: &'static str,
        attempts: u32,
        #[source]
        last: Box<EngineError>,
    },

    /// Success status, but the payload does not carry what the contract promises.
    #[error("unexpected engine response to {action}: {message}")]
    EngineProtocol { action: &'static str, message: String },

    /// The caller abandoned the operation between attempts or polls.
    #[error("{0} was cancelled")]
    Cancelled(&'static str),

    /// A polling loop spent its poll budget or deadline before reaching 100%.
    #[error("{phase} did not complete after {polls} poll(s) in {elapsed:?}")]
    PollLimitExceeded { phase: &'static str, polls: u32, elapsed: Duration },
}

impl EngineError {
    /// Stable, machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::TransientTransport { .. } => "transient_transport",
            EngineError::NonSuccessResponse { .. } => "non_success_response",
            EngineError::ExhaustedRetries { .. } => "exhausted_retries",
            EngineError::EngineProtocol { .. } => "engine_protocol",
            EngineError::Cancelled(_) => "cancelled",
            EngineError::PollLimitExceeded { .. } => "poll_limit_exceeded",
        }
    }

    /// Only the two transient classes are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::TransientTransport { .. } | EngineError::NonSuccessResponse { .. }
        )
    }

    /// True when the engine reported that it holds no job under the queried
    /// identifier (`{"code": "does_not_exist"}`), either directly or as the
    /// last failure before the retry budget ran out.
    pub fn is_unknown_job(&self) -> bool {
        match self {
            EngineError::NonSuccessResponse { body, .. } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("code").and_then(Value::as_str).map(|c| c == "does_not_exist"))
                .unwrap_or(false),
            EngineError::ExhaustedRetries { last, .. } => last.is_unknown_job(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found_body() -> EngineError {
        EngineError::NonSuccessResponse {
            action: "ascan/view/status",
            status: 400,
            body: r#"{"code":"does_not_exist","message":"Does Not Exist"}"#.to_string(),
        }
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(not_found_body().is_retryable());
        assert!(EngineError::TransientTransport { action: "a", message: "reset".into() }.is_retryable());
        assert!(!EngineError::EngineProtocol { action: "a", message: "m".into() }.is_retryable());
        assert!(!EngineError::InvalidInput("x".into()).is_retryable());
        assert!(!EngineError::Cancelled("a").is_retryable());
    }

    #[test]
    fn unknown_job_is_detected_through_exhaustion() {
        let exhausted = EngineError::ExhaustedRetries {
            action: "ascan/view/status",
            attempts: 3,
            last: Box::new(not_found_body()),
        };
        assert!(exhausted.is_unknown_job());
        assert_eq!(exhausted.kind(), "exhausted_retries");

        let other = EngineError::NonSuccessResponse {
            action: "ascan/view/status",
            status: 500,
            body: "boom".into(),
        };
        assert!(!other.is_unknown_job());
    }
}
