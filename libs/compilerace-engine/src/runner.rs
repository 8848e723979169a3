// Sequential, fail-fast test execution

use compilerace_common::types::{ExecutionRequest, TestCase, Verdict};
use tracing::{debug, info};

use crate::engine::ExecutionClient;
use crate::evaluator;
use crate::source::SourcePreparer;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub all_passed: bool,
    /// One per attempted case; ends at the first failure
    pub verdicts: Vec<Verdict>,
}

impl RunReport {
    pub fn first_failure(&self) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| !v.passed)
    }
}

pub struct TestRunner<'a> {
    client: &'a ExecutionClient,
    preparer: &'a SourcePreparer,
    language_id: u32,
}

impl<'a> TestRunner<'a> {
    pub fn new(client: &'a ExecutionClient, preparer: &'a SourcePreparer, language_id: u32) -> Self {
        Self {
            client,
            preparer,
            language_id,
        }
    }

    /// Run the cases one at a time and stop at the first failure.
    ///
    /// Labels are numbered from `start_label_offset + 1`.
    pub async fn run(&self, source: &str, test_cases: &[TestCase], start_label_offset: usize) -> RunReport {
        let mut verdicts = Vec::with_capacity(test_cases.len());

        for (idx, test_case) in test_cases.iter().enumerate() {
            let number = start_label_offset + idx + 1;
            let request = ExecutionRequest {
                source_code: self.preparer.prepare(source),
                stdin: test_case.stdin.clone(),
                language_id: self.language_id,
            };

            let verdict = match self.client.submit(&request).await {
                Ok(result) => evaluator::evaluate_test(number, &result, test_case),
                Err(e) => {
                    info!(test = number, error = %e, "Submission failed");
                    evaluator::run_error(number, &e.to_string())
                }
            };

            debug!(test = number, kind = ?verdict.kind, "Test evaluated");
            let passed = verdict.passed;
            verdicts.push(verdict);
            if !passed {
                return RunReport {
                    all_passed: false,
                    verdicts,
                };
            }
        }

        RunReport {
            all_passed: true,
            verdicts,
        }
    }
}
