// Scripted execution service for unit tests

use async_trait::async_trait;
use compilerace_common::types::{ExecutionRequest, ExecutionResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::engine::ExecutionService;
use crate::error::ExecutionError;
use crate::judge0::LanguageEntry;

pub(crate) fn java_catalog() -> Vec<LanguageEntry> {
    vec![
        LanguageEntry::new(26, "Java (OpenJDK 8)"),
        LanguageEntry::new(62, "Java (OpenJDK 13.0.1)"),
        LanguageEntry::new(91, "Java (JDK 17.0.6)"),
        LanguageEntry::new(96, "JavaFX (JDK 17.0.6, OpenJFX 22.0.2)"),
        LanguageEntry::new(63, "JavaScript (Node.js 12.14.0)"),
        LanguageEntry::new(71, "Python (3.8.1)"),
        LanguageEntry::new(102, "JavaScript (Node.js 22.08.0)"),
    ]
}

/// How the fake service answers one submission
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Processing for `pending` polls, then the result
    Finish { pending: u32, result: ExecutionResult },
    Never,
    RejectCreate(u16),
}

impl Reply {
    pub(crate) fn stdout(stdout: &str) -> Self {
        Self::pending_then(0, stdout)
    }

    pub(crate) fn pending_then(pending: u32, stdout: &str) -> Self {
        Reply::Finish {
            pending,
            result: ExecutionResult {
                stdout: stdout.to_string(),
                status_id: 3,
                status_description: Some("Accepted".to_string()),
                ..Default::default()
            },
        }
    }

    pub(crate) fn compile_error(message: &str) -> Self {
        Reply::Finish {
            pending: 0,
            result: ExecutionResult {
                compile_output: message.to_string(),
                status_id: 6,
                status_description: Some("Compilation Error".to_string()),
                ..Default::default()
            },
        }
    }

    pub(crate) fn stderr(message: &str) -> Self {
        Reply::Finish {
            pending: 0,
            result: ExecutionResult {
                stderr: message.to_string(),
                status_id: 11,
                status_description: Some("Runtime Error (NZEC)".to_string()),
                ..Default::default()
            },
        }
    }
}

enum Catalog {
    Entries(Vec<LanguageEntry>),
    Unreachable,
    Status(u16),
}

type Responder = Box<dyn Fn(&ExecutionRequest) -> Reply + Send + Sync>;

pub(crate) struct ScriptedService {
    catalog: Catalog,
    responder: Responder,
    catalog_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    submissions: Mutex<Vec<ExecutionRequest>>,
    pending: Mutex<HashMap<String, (u32, Option<ExecutionResult>)>>,
}

impl ScriptedService {
    fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog,
            responder: Box::new(|_| Reply::stdout("")),
            catalog_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn java() -> Self {
        Self::with_catalog(Catalog::Entries(java_catalog()))
    }

    pub(crate) fn unreachable() -> Self {
        Self::with_catalog(Catalog::Unreachable)
    }

    pub(crate) fn catalog_status(status: u16) -> Self {
        Self::with_catalog(Catalog::Status(status))
    }

    pub(crate) fn replying<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ExecutionRequest) -> Reply + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    /// Answer each stdin with the paired stdout; unknown input prints nothing
    pub(crate) fn answering(self, pairs: &[(&str, &str)]) -> Self {
        let table: HashMap<String, String> = pairs
            .iter()
            .map(|(stdin, stdout)| (stdin.to_string(), stdout.to_string()))
            .collect();
        self.replying(move |request| {
            Reply::stdout(table.get(&request.stdin).map(String::as_str).unwrap_or(""))
        })
    }

    pub(crate) fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn submissions(&self) -> Vec<ExecutionRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub(crate) fn submitted_stdins(&self) -> Vec<String> {
        self.submissions().into_iter().map(|r| r.stdin).collect()
    }
}

#[async_trait]
impl ExecutionService for ScriptedService {
    async fn list_languages(&self) -> Result<Vec<LanguageEntry>, ExecutionError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        match &self.catalog {
            Catalog::Entries(entries) => Ok(entries.clone()),
            Catalog::Unreachable => Err(ExecutionError::ServiceUnreachable {
                url: "http://judge.invalid/languages".to_string(),
                message: "connection refused".to_string(),
            }),
            Catalog::Status(status) => Err(ExecutionError::ServiceError {
                endpoint: "http://judge.invalid/languages".to_string(),
                status: *status,
                body: "unavailable".to_string(),
            }),
        }
    }

    async fn create_submission(&self, request: &ExecutionRequest) -> Result<String, ExecutionError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        let token = format!("token-{}", submissions.len());

        let entry = match (self.responder)(request) {
            Reply::RejectCreate(status) => {
                return Err(ExecutionError::SubmissionCreateFailed {
                    status,
                    body: "rejected".to_string(),
                })
            }
            Reply::Finish { pending, result } => (pending, Some(result)),
            Reply::Never => (0, None),
        };
        self.pending.lock().unwrap().insert(token.clone(), entry);
        Ok(token)
    }

    async fn get_submission(&self, token: &str) -> Result<ExecutionResult, ExecutionError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap();
        let (remaining, result) = pending
            .get_mut(token)
            .ok_or_else(|| ExecutionError::SubmissionFetchFailed {
                token: token.to_string(),
                status: 404,
                body: "unknown token".to_string(),
            })?;

        match result {
            Some(result) if *remaining == 0 => Ok(result.clone()),
            _ => {
                *remaining = remaining.saturating_sub(1);
                Ok(ExecutionResult {
                    status_id: 2,
                    status_description: Some("Processing".to_string()),
                    ..Default::default()
                })
            }
        }
    }
}
