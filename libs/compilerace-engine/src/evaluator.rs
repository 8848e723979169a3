/// Test Evaluator - Output Normalization and Verdict Classification
///
/// **Core Responsibility:**
/// Compare a terminal execution result against the expected output and
/// classify it as a verdict.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP or the execution service
/// - Knows nothing about the race clock
/// - Pure function: (execution result, expected output) → verdict
///
/// **Normalization Rules:**
/// - CRLF → LF: YES
/// - Trailing whitespace per line: trimmed
/// - Leading/trailing whitespace of the whole text: trimmed
/// - Internal whitespace and case: preserved (exact match required)
///
/// **Classification Order:**
/// 1. Non-empty compiler output → Compilation Error
/// 2. Non-empty stderr → Runtime Error
/// 3. stdout mismatch → Wrong Answer

use compilerace_common::types::{ExecutionResult, TestCase, Verdict, VerdictKind};

use crate::error::excerpt;

/// Longest compiler/stderr excerpt kept in a verdict
pub const DETAIL_CHARS: usize = 300;

/// Longest request-error message kept in a verdict
pub const RUN_ERROR_CHARS: usize = 140;

/// Canonicalize captured or expected output for comparison.
///
/// Idempotent: `normalize_output(&normalize_output(x)) == normalize_output(x)`.
pub fn normalize_output(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn detail(text: &str) -> String {
    let mut cut = excerpt(text, DETAIL_CHARS);
    if text.chars().count() > DETAIL_CHARS {
        cut.push('…');
    }
    cut
}

/// Classify one terminal result against its test case.
///
/// `number` is the 1-based label position.
pub fn evaluate_test(number: usize, result: &ExecutionResult, test_case: &TestCase) -> Verdict {
    let stdout = normalize_output(&result.stdout);
    let stderr = normalize_output(&result.stderr);
    let compile_output = normalize_output(&result.compile_output);
    let expected = normalize_output(&test_case.expected_output);

    if !compile_output.is_empty() {
        return Verdict::new(number, VerdictKind::CompilationError, Some(detail(&compile_output)));
    }
    if !stderr.is_empty() {
        return Verdict::new(number, VerdictKind::RuntimeError, Some(detail(&stderr)));
    }
    if stdout == expected {
        Verdict::accepted(number)
    } else {
        Verdict::new(number, VerdictKind::WrongAnswer, None)
    }
}

/// Verdict for a test case whose submission could not be completed
pub fn run_error(number: usize, message: &str) -> Verdict {
    let message = excerpt(message, RUN_ERROR_CHARS);
    let detail = if message.is_empty() {
        "Run error".to_string()
    } else {
        format!("Run error: {}", message)
    };
    Verdict::new(number, VerdictKind::RunError, Some(detail))
}
