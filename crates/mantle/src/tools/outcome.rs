//! Normalized invocation outcomes
//!
//! Every dispatch terminates in exactly one [`Outcome`], success or typed
//! failure. Outcomes are immutable once finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure classification for an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown tool name
    NotFound,
    /// Arguments did not match the tool's parameter schema
    ValidationFailed,
    /// Deadline elapsed before the tool returned
    Timeout,
    /// The tool raised during execution
    ExecutionFailed,
    /// Tool-level access-control rejection
    PermissionDenied,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ExecutionFailed => "execution_failed",
            ErrorKind::PermissionDenied => "permission_denied",
        };
        write!(f, "{}", s)
    }
}

impl ErrorKind {
    /// Whether the tool body actually ran before this failure.
    /// Short-circuit failures never affect the duration average.
    pub fn ran(&self) -> bool {
        !matches!(self, ErrorKind::NotFound | ErrorKind::ValidationFailed)
    }
}

/// The finalized result of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub invocation_id: Uuid,
    pub task_id: Uuid,
    pub tool: String,
    pub success: bool,
    /// Opaque payload, present iff success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Failure classification, present iff failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Outcome {
    /// Finalize a successful invocation
    pub fn success(
        invocation_id: Uuid,
        task_id: Uuid,
        tool: impl Into<String>,
        output: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            invocation_id,
            task_id,
            tool: tool.into(),
            success: true,
            output: Some(output.into()),
            error_kind: None,
            error: None,
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
        }
    }

    /// Finalize a failed invocation
    pub fn failure(
        invocation_id: Uuid,
        task_id: Uuid,
        tool: impl Into<String>,
        kind: ErrorKind,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            invocation_id,
            task_id,
            tool: tool.into(),
            success: false,
            output: None,
            error_kind: Some(kind),
            error: Some(error.into()),
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
        }
    }
}

fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let o = Outcome::success(Uuid::new_v4(), Uuid::new_v4(), "echo", "hi", Utc::now());
        assert!(o.success);
        assert_eq!(o.output.as_deref(), Some("hi"));
        assert!(o.error_kind.is_none());
        assert!(o.error.is_none());
    }

    #[test]
    fn test_failure_shape() {
        let o = Outcome::failure(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "echo",
            ErrorKind::Timeout,
            "deadline elapsed",
            Utc::now(),
        );
        assert!(!o.success);
        assert!(o.output.is_none());
        assert_eq!(o.error_kind, Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_error_kind_ran() {
        assert!(!ErrorKind::NotFound.ran());
        assert!(!ErrorKind::ValidationFailed.ran());
        assert!(ErrorKind::Timeout.ran());
        assert!(ErrorKind::ExecutionFailed.ran());
        assert!(ErrorKind::PermissionDenied.ran());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::ValidationFailed).unwrap();
        assert_eq!(json, "\"validation_failed\"");
    }
}
