/// Execution Client - Remote Compile-and-Run
///
/// **Core Responsibility:**
/// Run one (source, stdin) pair on the remote execution service and hand
/// back its terminal result.
///
/// **Architectural Boundary:**
/// - Client knows HOW to talk to the service (catalog, create, poll)
/// - Client does NOT compare outputs or decide verdicts
/// - The transport sits behind `ExecutionService`, so the polling and
///   caching rules are the same for Judge0 and for test doubles
///
/// **Language id cache:**
/// memory → durable store → catalog request. A catalog round-trip only
/// happens when neither cache holds a parsable id.

use async_trait::async_trait;
use compilerace_common::config::{Config, PollSettings};
use compilerace_common::store::{self, KeyValueStore};
use compilerace_common::types::{ExecutionRequest, ExecutionResult};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;
use crate::judge0::LanguageEntry;

/// The remote compile-and-run capability
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn list_languages(&self) -> Result<Vec<LanguageEntry>, ExecutionError>;

    /// Queue a submission without waiting; returns its opaque token
    async fn create_submission(&self, request: &ExecutionRequest) -> Result<String, ExecutionError>;

    async fn get_submission(&self, token: &str) -> Result<ExecutionResult, ExecutionError>;
}

/// Additive backoff between result polls
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub step: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current + self.step).min(self.max_delay)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollPolicy {
    fn from(settings: &PollSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            step: Duration::from_millis(settings.step_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_attempts: settings.max_attempts,
        }
    }
}

/// Which catalog entries count as the target runtime
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSelector {
    pub keyword: String,
    pub preferred: String,
}

impl Default for RuntimeSelector {
    fn default() -> Self {
        let config = Config::default();
        Self::from(&config)
    }
}

impl From<&Config> for RuntimeSelector {
    fn from(config: &Config) -> Self {
        Self {
            keyword: config.runtime_keyword.to_lowercase(),
            preferred: config.preferred_distribution.to_lowercase(),
        }
    }
}

impl RuntimeSelector {
    /// Pick the newest matching runtime, preferring the canonical
    /// distribution. Newest means highest id.
    ///
    /// The keyword must appear as a whole word, so "java" does not match
    /// "JavaScript" or "JavaFX".
    pub fn pick(&self, catalog: &[LanguageEntry]) -> Result<u32, ExecutionError> {
        let runtime = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&self.keyword)))
            .map_err(|_| ExecutionError::RuntimeNotFound(self.keyword.clone()))?;
        let matches: Vec<&LanguageEntry> = catalog
            .iter()
            .filter(|entry| entry.name.as_deref().map_or(false, |name| runtime.is_match(name)))
            .collect();
        if matches.is_empty() {
            return Err(ExecutionError::RuntimeNotFound(self.keyword.clone()));
        }

        let preferred: Vec<&LanguageEntry> = matches
            .iter()
            .copied()
            .filter(|entry| self.name_contains(entry, &self.preferred))
            .collect();
        let pool = if preferred.is_empty() { matches } else { preferred };

        pool.iter()
            .map(|entry| entry.id)
            .max()
            .ok_or_else(|| ExecutionError::RuntimeNotFound(self.keyword.clone()))
    }

    fn name_contains(&self, entry: &LanguageEntry, needle: &str) -> bool {
        entry
            .name
            .as_deref()
            .map(|name| name.to_lowercase().contains(needle))
            .unwrap_or(false)
    }
}

pub struct ExecutionClient {
    service: Arc<dyn ExecutionService>,
    store: Arc<dyn KeyValueStore>,
    selector: RuntimeSelector,
    poll: PollPolicy,
    language_id: Option<u32>,
}

impl ExecutionClient {
    pub fn new(
        service: Arc<dyn ExecutionService>,
        store: Arc<dyn KeyValueStore>,
        selector: RuntimeSelector,
        poll: PollPolicy,
    ) -> Self {
        Self {
            service,
            store,
            selector,
            poll,
            language_id: None,
        }
    }

    fn cache_key(&self) -> String {
        store::language_id_key(&self.selector.keyword)
    }

    /// Id cached in memory, if any
    pub fn cached_language_id(&self) -> Option<u32> {
        self.language_id
    }

    #[tracing::instrument(skip(self), fields(runtime = %self.selector.keyword))]
    pub async fn resolve_language_id(&mut self) -> Result<u32, ExecutionError> {
        if let Some(id) = self.language_id {
            return Ok(id);
        }

        let key = self.cache_key();
        if let Some(id) = store::get_parsed::<u32>(self.store.as_ref(), &key) {
            debug!(language_id = id, "Language id loaded from store");
            self.language_id = Some(id);
            return Ok(id);
        }

        let catalog = self.service.list_languages().await?;
        let id = self.selector.pick(&catalog)?;
        info!(language_id = id, catalog_size = catalog.len(), "Resolved language id");

        self.language_id = Some(id);
        if let Err(e) = self.store.set(&key, &id.to_string()) {
            warn!(error = %e, "Failed to persist language id");
        }
        Ok(id)
    }

    /// Drop both cached copies so the next resolution asks the service
    pub fn forget_language_id(&mut self) -> Result<(), ExecutionError> {
        self.language_id = None;
        self.store.remove(&self.cache_key())?;
        Ok(())
    }

    /// Create a submission, then poll until it leaves the queued and
    /// processing states or the attempt budget runs out.
    #[tracing::instrument(skip(self, request), fields(language_id = request.language_id, stdin_len = request.stdin.len()))]
    pub async fn submit(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        let token = self.service.create_submission(request).await?;
        debug!(token = %token, "Submission created");

        let mut delay = self.poll.initial_delay;
        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(delay).await;

            let result = self.service.get_submission(&token).await?;
            if result.is_terminal() {
                debug!(
                    token = %token,
                    attempt,
                    status_id = result.status_id,
                    status = result.status_description.as_deref().unwrap_or(""),
                    "Submission finished"
                );
                return Ok(result);
            }

            debug!(token = %token, attempt, status_id = result.status_id, "Submission pending");
            delay = self.poll.next_delay(delay);
        }

        warn!(token = %token, attempts = self.poll.max_attempts, "Submission never finished");
        Err(ExecutionError::ExecutionTimeout {
            token,
            attempts: self.poll.max_attempts,
        })
    }
}
