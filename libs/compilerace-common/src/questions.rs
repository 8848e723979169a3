// Question bank loading and selection

use crate::types::{Question, Sample, TestCase};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker replaced by the (indented) body in the program template.
pub const CODE_MARKER: &str = "{{CODE}}";

pub const DEFAULT_TEMPLATE: &str = "import java.util.Scanner;\nclass Main{\n  public static void main(String[] args){\n    Scanner sc = new Scanner(System.in);\n    {{CODE}}\n  }\n}";

const BUILTIN_BANK: &str = include_str!("../../../config/questions.json");

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question bank {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl QuestionBank {
    /// The bank compiled into the binary
    pub fn builtin() -> Result<Self, QuestionBankError> {
        Self::parse(BUILTIN_BANK)
    }

    pub fn load(path: &Path) -> Result<Self, QuestionBankError> {
        let content = fs::read_to_string(path).map_err(|source| QuestionBankError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, QuestionBankError> {
        let mut bank: QuestionBank = serde_json::from_str(content)?;
        if !bank.template.contains(CODE_MARKER) {
            tracing::warn!("Question bank template has no {} marker, using default", CODE_MARKER);
            bank.template = default_template();
        }
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Resolve a raw index (as typed by the user) to a question.
    /// Missing or non-numeric input selects the first question, out of
    /// range input is clamped, and an empty bank yields the fallback.
    pub fn select(&self, raw_index: Option<&str>) -> (usize, Question) {
        if self.questions.is_empty() {
            return (0, fallback_question());
        }
        let index = clamp_index(raw_index, self.questions.len());
        (index, self.questions[index].clone())
    }
}

/// Parse and clamp a question index into `[0, len - 1]`
pub fn clamp_index(raw_index: Option<&str>, len: usize) -> usize {
    let parsed = raw_index
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let last = len.saturating_sub(1) as i64;
    parsed.clamp(0, last) as usize
}

/// Index of the challenge after `current`, if there is one
pub fn next_question_index(current: usize, len: usize) -> Option<usize> {
    let next = current + 1;
    (next < len).then_some(next)
}

pub fn fallback_question() -> Question {
    Question {
        id: "fallback-hello".to_string(),
        title: "Hello World".to_string(),
        difficulty: None,
        tags: Vec::new(),
        objective: "Print \"Hello World\".".to_string(),
        sample: Sample {
            input: String::new(),
            output: "Hello World".to_string(),
        },
        tests: vec![TestCase::new("", "Hello World")],
        starter_insert: Some(String::new()),
    }
}
