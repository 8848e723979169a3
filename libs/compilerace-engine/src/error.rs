use compilerace_common::store::StoreError;
use thiserror::Error;

/// Longest response body excerpt carried inside an error
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Failures talking to the remote execution service.
///
/// Verdict-level failures (compilation error, runtime error, wrong answer)
/// are not errors; they are classified by the evaluator.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Cannot reach {url} (network/CORS). {message}")]
    ServiceUnreachable { url: String, message: String },

    #[error("Execution service {endpoint} failed: HTTP {status}. {body}")]
    ServiceError {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{0} not found in the execution service language catalog")]
    RuntimeNotFound(String),

    #[error("Submission failed: HTTP {status}. {body}")]
    SubmissionCreateFailed { status: u16, body: String },

    #[error("Fetching submission {token} failed: HTTP {status}. {body}")]
    SubmissionFetchFailed {
        token: String,
        status: u16,
        body: String,
    },

    #[error("Submission {token} did not finish after {attempts} polls")]
    ExecutionTimeout { token: String, attempts: u32 },

    #[error("Malformed response from execution service: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecutionError {
    /// Whether the failure happened while resolving the runtime, as
    /// opposed to while running a submission.
    pub fn is_catalog_failure(&self) -> bool {
        matches!(
            self,
            ExecutionError::ServiceUnreachable { .. }
                | ExecutionError::ServiceError { .. }
                | ExecutionError::RuntimeNotFound(_)
        )
    }
}

/// Cut `text` to at most `max_chars` characters
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
