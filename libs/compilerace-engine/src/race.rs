/// Race Orchestrator - One Timed Attempt at One Question
///
/// **Responsibility:**
/// Own the race state, drive the quick and full test phases, and turn the
/// outcome into a summary or a retryable failure.
///
/// **State machine:**
/// NotStarted → Racing (first non-blank edit starts the clock)
/// Racing → Judging (run) → Racing (any failure, clock resumed)
///                        → Finished (all phases passed)
/// Finished → NotStarted only through `restart`.
///
/// **Phases:**
/// 1. Quick: the first `QUICK_CASES` cases (all of them when there are fewer)
/// 2. Full: every case, only when it is strictly larger than the quick set
///
/// The full phase re-runs the quick prefix.

use chrono::{DateTime, Utc};
use compilerace_common::store::{self, KeyValueStore};
use compilerace_common::types::{Question, TestCase, Verdict};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::clock::RaceClock;
use crate::engine::ExecutionClient;
use crate::runner::{RunReport, TestRunner};
use crate::source::SourcePreparer;

pub const QUICK_CASES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RacePhase {
    NotStarted,
    Racing,
    Judging,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestPhase {
    Quick,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub question_id: String,
    pub final_time_secs: u64,
    pub chars_typed: usize,
    pub chars_per_second: f64,
    pub best_time_secs: u64,
    pub new_best: bool,
    pub verdicts: Vec<Verdict>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    NotStarted,
    AlreadyRunning,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Preconditions did not hold; nothing was submitted
    Ignored(IgnoredReason),
    /// The runtime could not be resolved; the clock is running again
    CompilerUnavailable { message: String },
    /// A phase failed; the clock is running again
    Failed { phase: TestPhase, verdicts: Vec<Verdict> },
    Accepted(RaceSummary),
}

#[derive(Debug, Clone)]
enum State {
    NotStarted,
    Racing { clock: RaceClock },
    Judging { final_time: u64 },
    Finished(Box<RaceSummary>),
}

/// Split the cases into the quick prefix and the full set
pub fn partition(cases: &[TestCase]) -> (&[TestCase], &[TestCase]) {
    let quick = cases.len().min(QUICK_CASES);
    (&cases[..quick], cases)
}

/// Status line for the editor, e.g. "12 lines · 240 chars"
pub fn editor_stats(text: &str) -> String {
    let lines = text.split('\n').count();
    format!("{} lines · {} chars", lines, text.chars().count())
}

pub struct RaceOrchestrator {
    client: ExecutionClient,
    preparer: SourcePreparer,
    store: Arc<dyn KeyValueStore>,
    question: Question,
    state: State,
    source: String,
    last_length: usize,
    total_chars_typed: usize,
}

impl RaceOrchestrator {
    /// Session start: the editor holds the question's starter code and the
    /// clock is not running.
    pub fn new(
        client: ExecutionClient,
        preparer: SourcePreparer,
        store: Arc<dyn KeyValueStore>,
        question: Question,
    ) -> Self {
        let source = preparer.starter_code(&question);
        let last_length = source.chars().count();
        Self {
            client,
            preparer,
            store,
            question,
            state: State::NotStarted,
            source,
            last_length,
            total_chars_typed: 0,
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn phase(&self) -> RacePhase {
        match self.state {
            State::NotStarted => RacePhase::NotStarted,
            State::Racing { .. } => RacePhase::Racing,
            State::Judging { .. } => RacePhase::Judging,
            State::Finished(_) => RacePhase::Finished,
        }
    }

    pub fn total_chars_typed(&self) -> usize {
        self.total_chars_typed
    }

    pub fn elapsed_secs(&self) -> u64 {
        match &self.state {
            State::NotStarted => 0,
            State::Racing { clock } => clock.elapsed_secs(),
            State::Judging { final_time } => *final_time,
            State::Finished(summary) => summary.final_time_secs,
        }
    }

    pub fn best_time(&self) -> Option<u64> {
        store::get_parsed::<u64>(self.store.as_ref(), &store::best_time_key(&self.question.id))
            .filter(|best| *best > 0)
    }

    /// Resolve the runtime ahead of the first run. Failure is left for
    /// the run itself to report.
    pub async fn warm_up(&mut self) {
        match self.client.resolve_language_id().await {
            Ok(id) => info!(language_id = id, "Execution service ready"),
            Err(e) => warn!(error = %e, "Warm-up could not resolve the runtime"),
        }
    }

    /// Observe the current editor text. Growth counts as typed
    /// characters; the first non-blank change starts the clock.
    /// Returns false once the race is finished and edits are locked.
    pub fn record_edit(&mut self, text: &str) -> bool {
        if matches!(self.state, State::Finished(_)) {
            return false;
        }
        if text == self.source {
            return true;
        }

        let length = text.chars().count();
        if length > self.last_length {
            self.total_chars_typed += length - self.last_length;
        }
        self.last_length = length;
        self.source = text.to_string();

        if matches!(self.state, State::NotStarted) && !text.trim().is_empty() {
            info!(question = %self.question.id, "Race started");
            self.state = State::Racing {
                clock: RaceClock::start(),
            };
        }
        true
    }

    /// Back to a fresh race with the starter code. The language id cache
    /// is kept.
    pub fn restart(&mut self) {
        self.source = self.preparer.starter_code(&self.question);
        self.last_length = self.source.chars().count();
        self.total_chars_typed = 0;
        self.state = State::NotStarted;
        info!(question = %self.question.id, "Race restarted");
    }

    pub async fn run(&mut self) -> RunOutcome {
        let final_time = match &self.state {
            State::NotStarted => return RunOutcome::Ignored(IgnoredReason::NotStarted),
            State::Judging { .. } => return RunOutcome::Ignored(IgnoredReason::AlreadyRunning),
            State::Finished(_) => return RunOutcome::Ignored(IgnoredReason::Finished),
            State::Racing { clock } => clock.freeze(),
        };
        self.state = State::Judging { final_time };

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("race_run", run_id = %run_id, question = %self.question.id, final_time);
        self.judge(final_time).instrument(span).await
    }

    async fn judge(&mut self, final_time: u64) -> RunOutcome {
        let language_id = match self.client.resolve_language_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Compiler unavailable");
                self.resume(final_time);
                return RunOutcome::CompilerUnavailable {
                    message: e.to_string(),
                };
            }
        };

        let cases = self.question.test_cases();
        let (quick, full) = partition(&cases);

        let runner = TestRunner::new(&self.client, &self.preparer, language_id);
        let quick_report = runner.run(&self.source, quick, 0).await;
        if !quick_report.all_passed {
            return self.fail(TestPhase::Quick, quick_report, final_time);
        }

        let report = if full.len() > quick.len() {
            let full_report = runner.run(&self.source, full, 0).await;
            if !full_report.all_passed {
                return self.fail(TestPhase::Full, full_report, final_time);
            }
            full_report
        } else {
            quick_report
        };

        RunOutcome::Accepted(self.finish(final_time, report.verdicts))
    }

    fn fail(&mut self, phase: TestPhase, report: RunReport, final_time: u64) -> RunOutcome {
        if let Some(failure) = report.first_failure() {
            info!(phase = ?phase, test = %failure.label, "Run failed");
        }
        self.resume(final_time);
        RunOutcome::Failed {
            phase,
            verdicts: report.verdicts,
        }
    }

    fn resume(&mut self, final_time: u64) {
        self.state = State::Racing {
            clock: RaceClock::resume_at(final_time),
        };
    }

    fn finish(&mut self, final_time: u64, verdicts: Vec<Verdict>) -> RaceSummary {
        let previous = self.best_time();
        let new_best = previous.map_or(true, |best| final_time < best);
        if new_best {
            let key = store::best_time_key(&self.question.id);
            if let Err(e) = self.store.set(&key, &final_time.to_string()) {
                warn!(error = %e, "Failed to persist best time");
            }
        }

        let summary = RaceSummary {
            question_id: self.question.id.clone(),
            final_time_secs: final_time,
            chars_typed: self.total_chars_typed,
            chars_per_second: self.total_chars_typed as f64 / final_time as f64,
            best_time_secs: if new_best { final_time } else { previous.unwrap_or(final_time) },
            new_best,
            verdicts,
            finished_at: Utc::now(),
        };
        info!(
            final_time,
            chars_per_second = summary.chars_per_second,
            new_best,
            "Race finished"
        );
        self.state = State::Finished(Box::new(summary.clone()));
        summary
    }
}
