// Turns editor text into a compilable program

use compilerace_common::questions::{CODE_MARKER, DEFAULT_TEMPLATE};
use compilerace_common::types::Question;
use lazy_static::lazy_static;
use regex::Regex;

pub const INDENT: &str = "    ";
pub const DEFAULT_STARTER_BODY: &str = "// write your code here";

lazy_static! {
    static ref ENTRY_TYPE: Regex = Regex::new(r"\bclass\s+Main\b").unwrap();
    static ref PUBLIC_ENTRY_TYPE: Regex = Regex::new(r"\bpublic\s+class\s+Main\b").unwrap();
    static ref MAIN_METHOD: Regex = Regex::new(r"\bpublic\s+static\s+void\s+main\s*\(").unwrap();
    static ref IMPORT_LINE: Regex = Regex::new(r"(?m)^\s*import\s+.+;").unwrap();
}

/// Wraps snippets into the program template; complete programs pass through.
#[derive(Debug, Clone)]
pub struct SourcePreparer {
    template: String,
}

impl Default for SourcePreparer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl SourcePreparer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Any single match is enough.
    pub fn is_complete_program(code: &str) -> bool {
        ENTRY_TYPE.is_match(code)
            || PUBLIC_ENTRY_TYPE.is_match(code)
            || MAIN_METHOD.is_match(code)
            || IMPORT_LINE.is_match(code)
    }

    pub fn prepare(&self, raw: &str) -> String {
        let code = raw.trim();
        if Self::is_complete_program(code) {
            return code.to_string();
        }
        self.render(code)
    }

    /// Starter code shown when a race begins or restarts
    pub fn starter_code(&self, question: &Question) -> String {
        let body = question
            .starter_insert
            .as_deref()
            .map(str::trim)
            .filter(|body| !body.is_empty())
            .unwrap_or(DEFAULT_STARTER_BODY);
        self.render(body)
    }

    fn render(&self, body: &str) -> String {
        let indented = body
            .split('\n')
            .map(|line| format!("{}{}", INDENT, line))
            .collect::<Vec<_>>()
            .join("\n");
        self.template.replacen(CODE_MARKER, &format!("{}\n", indented), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compilerace_common::questions::fallback_question;

    #[test]
    fn test_full_program_unchanged() {
        let program = "public class Main {\n  public static void main(String[] a) {\n    System.out.println(1);\n  }\n}";
        let preparer = SourcePreparer::default();
        assert_eq!(preparer.prepare(program), program);
        assert_eq!(preparer.prepare(&format!("\n\n{}\n  ", program)), program);
    }

    #[test]
    fn test_detection_patterns_are_independent() {
        assert!(SourcePreparer::is_complete_program("class Main{}"));
        assert!(SourcePreparer::is_complete_program("static public void x(){} public static void main (String[] a){}"));
        assert!(SourcePreparer::is_complete_program("int x = 1;\nimport java.util.*;"));
        assert!(!SourcePreparer::is_complete_program("int a = sc.nextInt();"));
        assert!(!SourcePreparer::is_complete_program("class MainHelper {}"));
        assert!(!SourcePreparer::is_complete_program("// import later"));
    }

    #[test]
    fn test_snippet_is_wrapped_and_indented() {
        let preparer = SourcePreparer::default();
        let snippet = "int a = sc.nextInt();\nint b = sc.nextInt();\nSystem.out.println(a + b);";
        let program = preparer.prepare(snippet);

        assert!(program.starts_with("import java.util.Scanner;\nclass Main{"));
        assert!(program.contains("Scanner sc = new Scanner(System.in);"));
        assert!(!program.contains(CODE_MARKER));
        // the template already indents the marker line
        assert!(program.contains(&format!("\n    {}int a = sc.nextInt();\n", INDENT)));
        assert!(program.contains(&format!("\n{}int b = sc.nextInt();\n", INDENT)));
        assert!(program.contains(&format!("\n{}System.out.println(a + b);\n", INDENT)));
        assert!(program.ends_with("\n  }\n}"));
    }

    #[test]
    fn test_empty_snippet_gives_skeleton() {
        let program = SourcePreparer::default().prepare("   \n ");
        assert!(program.contains("public static void main"));
        assert!(program.contains(&format!("\n    {}\n\n  }}", INDENT)));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let preparer = SourcePreparer::default();
        let once = preparer.prepare("System.out.println(\"hi\");");
        assert_eq!(preparer.prepare(&once), once.trim());
    }

    #[test]
    fn test_starter_code_default_body() {
        let preparer = SourcePreparer::default();
        let starter = preparer.starter_code(&fallback_question());
        assert!(starter.contains(&format!("{}{}{}", INDENT, INDENT, DEFAULT_STARTER_BODY)));
    }
}
