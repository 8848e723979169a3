// Judge0 HTTP binding of the execution service

use async_trait::async_trait;
use compilerace_common::types::{ExecutionRequest, ExecutionResult};
use reqwest::header::CACHE_CONTROL;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::engine::ExecutionService;
use crate::error::{excerpt, ExecutionError, BODY_EXCERPT_CHARS};

const RESULT_FIELDS: &str = "stdout,stderr,compile_output,status_id,status";

/// One entry of `GET /languages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
}

impl LanguageEntry {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateSubmission<'a> {
    language_id: u32,
    source_code: &'a str,
    stdin: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmissionToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct StatusInfo {
    id: u32,
    #[serde(default)]
    description: Option<String>,
}

/// `GET /submissions/{token}` body; every field may be missing or null
#[derive(Debug, Deserialize)]
struct SubmissionDetails {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    #[serde(default)]
    status_id: Option<u32>,
    #[serde(default)]
    status: Option<StatusInfo>,
}

impl From<SubmissionDetails> for ExecutionResult {
    fn from(details: SubmissionDetails) -> Self {
        let status_id = details
            .status_id
            .or_else(|| details.status.as_ref().map(|s| s.id))
            .unwrap_or(0);
        ExecutionResult {
            stdout: details.stdout.unwrap_or_default(),
            stderr: details.stderr.unwrap_or_default(),
            compile_output: details.compile_output.unwrap_or_default(),
            status_id,
            status_description: details.status.and_then(|s| s.description),
        }
    }
}

pub struct Judge0Service {
    http: reqwest::Client,
    base_url: String,
}

impl Judge0Service {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExecutionError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("compilerace/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExecutionError::ServiceUnreachable {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { http, base_url })
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, ExecutionError> {
        request.send().await.map_err(|e| ExecutionError::ServiceUnreachable {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

async fn body_excerpt(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    excerpt(&text, BODY_EXCERPT_CHARS)
}

#[async_trait]
impl ExecutionService for Judge0Service {
    async fn list_languages(&self) -> Result<Vec<LanguageEntry>, ExecutionError> {
        let url = format!("{}/languages", self.base_url);
        let response = self
            .send(self.http.get(&url).header(CACHE_CONTROL, "no-store"), &url)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::ServiceError {
                endpoint: url,
                status: status.as_u16(),
                body: body_excerpt(response).await,
            });
        }

        let languages: Vec<LanguageEntry> = response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
        debug!(count = languages.len(), "Fetched language catalog");
        Ok(languages)
    }

    async fn create_submission(&self, request: &ExecutionRequest) -> Result<String, ExecutionError> {
        let url = format!("{}/submissions?base64_encoded=false&wait=false", self.base_url);
        let body = CreateSubmission {
            language_id: request.language_id,
            source_code: &request.source_code,
            stdin: &request.stdin,
        };
        let response = self.send(self.http.post(&url).json(&body), &url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::SubmissionCreateFailed {
                status: status.as_u16(),
                body: body_excerpt(response).await,
            });
        }

        let created: SubmissionToken = response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
        Ok(created.token)
    }

    async fn get_submission(&self, token: &str) -> Result<ExecutionResult, ExecutionError> {
        let url = format!(
            "{}/submissions/{}?base64_encoded=false&fields={}",
            self.base_url, token, RESULT_FIELDS
        );
        let response = self.send(self.http.get(&url), &url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::SubmissionFetchFailed {
                token: token.to_string(),
                status: status.as_u16(),
                body: body_excerpt(response).await,
            });
        }

        let details: SubmissionDetails = response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
        Ok(details.into())
    }
}
