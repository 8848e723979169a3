use serde::{Deserialize, Serialize};
use std::fmt;

/// One stdin/expected-output pair from the question bank.
/// Position in the question's list determines its "Test N" label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub stdin: String,
    #[serde(rename = "out", default)]
    pub expected_output: String,
}

impl TestCase {
    pub fn new(stdin: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            stdin: stdin.into(),
            expected_output: expected_output.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub sample: Sample,
    #[serde(default)]
    pub tests: Vec<TestCase>,
    #[serde(default)]
    pub starter_insert: Option<String>,
}

impl Question {
    /// Test cases to judge against. A question without tests is judged
    /// against its sample.
    pub fn test_cases(&self) -> Vec<TestCase> {
        if self.tests.is_empty() {
            vec![TestCase::new(self.sample.input.clone(), self.sample.output.clone())]
        } else {
            self.tests.clone()
        }
    }
}

/// A single (source, stdin) submission to the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub stdin: String,
    pub language_id: u32,
}

/// Judge0 keeps a submission in these states until it has a verdict.
pub const STATUS_IN_QUEUE: u32 = 1;
pub const STATUS_PROCESSING: u32 = 2;

/// Terminal output of one submission, with absent fields already
/// replaced by empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub status_id: u32,
    pub status_description: Option<String>,
}

impl ExecutionResult {
    /// A result is terminal once it has left the queued/processing states.
    pub fn is_terminal(&self) -> bool {
        self.status_id > STATUS_PROCESSING
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictKind {
    Accepted,
    WrongAnswer,
    CompilationError,
    RuntimeError,
    RunError,
}

impl VerdictKind {
    pub fn passed(self) -> bool {
        matches!(self, VerdictKind::Accepted)
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictKind::Accepted => "Accepted",
            VerdictKind::WrongAnswer => "Wrong Answer",
            VerdictKind::CompilationError => "Compilation Error",
            VerdictKind::RuntimeError => "Runtime Error",
            VerdictKind::RunError => "Run error",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one attempted test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: String,
    pub passed: bool,
    pub kind: VerdictKind,
    pub error_detail: Option<String>,
}

impl Verdict {
    /// `number` is the 1-based position used in the "Test N" label.
    pub fn new(number: usize, kind: VerdictKind, error_detail: Option<String>) -> Self {
        let label = if kind.passed() {
            format!("Test {}", number)
        } else {
            format!("Test {}: {}", number, kind)
        };
        Self {
            label,
            passed: kind.passed(),
            kind,
            error_detail,
        }
    }

    pub fn accepted(number: usize) -> Self {
        Self::new(number, VerdictKind::Accepted, None)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✅" } else { "❌" };
        write!(f, "{} {}", mark, self.label)?;
        if let Some(detail) = &self.error_detail {
            write!(f, "\n    {}", detail.replace('\n', "\n    "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_threshold() {
        let mut result = ExecutionResult::default();
        for status in [0, STATUS_IN_QUEUE, STATUS_PROCESSING] {
            result.status_id = status;
            assert!(!result.is_terminal());
        }
        result.status_id = 3;
        assert!(result.is_terminal());
        result.status_id = 6;
        assert!(result.is_terminal());
    }

    #[test]
    fn test_verdict_labels() {
        let pass = Verdict::accepted(3);
        assert_eq!(pass.label, "Test 3");
        assert!(pass.passed);

        let fail = Verdict::new(1, VerdictKind::CompilationError, Some("error: ';' expected".into()));
        assert_eq!(fail.label, "Test 1: Compilation Error");
        assert!(!fail.passed);
    }

    #[test]
    fn test_question_without_tests_uses_sample() {
        let question: Question = serde_json::from_str(
            r#"{"id":"q","title":"Q","sample":{"input":"1 2","output":"3"}}"#,
        )
        .unwrap();
        assert_eq!(question.test_cases(), vec![TestCase::new("1 2", "3")]);
    }

    #[test]
    fn test_test_case_wire_names() {
        let case: TestCase = serde_json::from_str(r#"{"stdin":"20 6","out":"26"}"#).unwrap();
        assert_eq!(case.expected_output, "26");
    }
}
