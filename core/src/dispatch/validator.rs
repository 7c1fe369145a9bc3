//! Heuristic checks on raw reasoning output.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::executor::types::Task;

pub const DEFAULT_MIN_RESPONSE_CHARS: usize = 10;

/// Share of letters in an unexpected script above which prose counts as
/// written in another natural language.
const FOREIGN_SCRIPT_RATIO: f32 = 0.3;

/// Programming languages the validator can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLanguage {
    Python,
    TypeScript,
    JavaScript,
    Rust,
    Go,
    Java,
}

impl CodeLanguage {
    pub const ALL: [CodeLanguage; 6] = [
        Self::Python,
        Self::TypeScript,
        Self::JavaScript,
        Self::Rust,
        Self::Go,
        Self::Java,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::TypeScript => "TypeScript",
            Self::JavaScript => "JavaScript",
            Self::Rust => "Rust",
            Self::Go => "Go",
            Self::Java => "Java",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "typescript" | "ts" | "tsx" => Some(Self::TypeScript),
            "javascript" | "js" | "jsx" | "node" => Some(Self::JavaScript),
            "rust" | "rs" => Some(Self::Rust),
            "go" | "golang" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// TypeScript projects accept plain JavaScript and vice versa.
    fn compatible_with(self, other: Self) -> bool {
        use CodeLanguage::*;
        self == other || matches!((self, other), (TypeScript, JavaScript) | (JavaScript, TypeScript))
    }

    fn markers(self) -> &'static [Regex] {
        match self {
            Self::Python => &PYTHON_MARKERS,
            Self::TypeScript => &TYPESCRIPT_MARKERS,
            Self::JavaScript => &JAVASCRIPT_MARKERS,
            Self::Rust => &RUST_MARKERS,
            Self::Go => &GO_MARKERS,
            Self::Java => &JAVA_MARKERS,
        }
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

lazy_static! {
    static ref FENCE_TAG: Regex = Regex::new(r"(?m)^```\s*([A-Za-z+#]+)\s*$").unwrap();

    static ref PYTHON_MARKERS: Vec<Regex> = compile(&[
        r"(?m)^\s*def \w+\(.*\)\s*(?:->\s*[\w\[\], ]+)?:\s*$",
        r"(?m)^\s*from [\w.]+ import ",
        r"(?m)^\s*import \w+(?:\.\w+)*\s*$",
        r"(?m)^\s*class \w+(?:\([\w., ]*\))?:\s*$",
        r"\bself\.\w+",
        r"(?m)^\s*elif\b",
        r"__init__|__name__",
        r"\bprint\(",
    ]);
    static ref TYPESCRIPT_MARKERS: Vec<Regex> = compile(&[
        r"(?m)^\s*(?:export\s+)?interface \w+",
        r"(?m)^\s*(?:export\s+)?type \w+\s*=",
        r":\s*(?:string|number|boolean|void|any|unknown)\b",
        r"(?m)^\s*import .* from ['\x22]",
        r"(?m)^\s*export (?:default |const |function |class )",
        r"\bconst \w+(?::\s*\w+)?\s*=",
    ]);
    static ref JAVASCRIPT_MARKERS: Vec<Regex> = compile(&[
        r"\brequire\(['\x22]",
        r"module\.exports",
        r"(?m)^\s*(?:const|let|var) \w+\s*=",
        r"=>\s*\{",
        r"console\.log\(",
    ]);
    static ref RUST_MARKERS: Vec<Regex> = compile(&[
        r"(?m)^\s*(?:pub\s+)?fn \w+",
        r"\blet mut\b",
        r"(?m)^\s*impl\b",
        r"(?m)^\s*use \w+(?:::\w+)+",
        r"(?m)^\s*#\[derive\(",
    ]);
    static ref GO_MARKERS: Vec<Regex> = compile(&[
        r"(?m)^package \w+\s*$",
        r"(?m)^func (?:\(\w+ \*?\w+\) )?\w+\(",
        r"\w+ := ",
        r"\bfmt\.Print",
    ]);
    static ref JAVA_MARKERS: Vec<Regex> = compile(&[
        r"\bpublic (?:static )?(?:class|void|final)\b",
        r"System\.out\.print",
        r"(?m)^import java\.",
    ]);

    static ref REFUSAL: Regex = Regex::new(
        r"(?i)^\s*(?:i'm sorry|i am sorry|sorry,|i cannot|i can't|i can not|i'm unable|i am unable|i won't|as an ai|i apologi[sz]e|unfortunately,? i (?:can(?:not|'t)|am unable))"
    )
    .unwrap();

    static ref PLACEHOLDER: Regex = Regex::new(
        r"(?i)\b(?:foo|bar|baz|qux)\s*\(|\bpath/to/|\byour[_-]?api[_-]?key\b|\bYOUR_[A-Z_]{3,}\b|\blorem ipsum\b|<placeholder>|\.\.\.\s*(?:rest of (?:the )?code|existing code)|//\s*implementation goes here|#\s*implementation goes here"
    )
    .unwrap();

    static ref FUTURE_INTENT: Regex = Regex::new(
        r"(?i)^\s*(?:sure[,!.]?\s+)?(?:i will|i'll|i am going to|i'm going to|let me|i would|next,? i will)\s+(?:now\s+)?(?:create|write|implement|add|generate|build|make|update|modify|start|set up|refactor)\b"
    )
    .unwrap();
}

/// Why an output was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    TooShort { chars: usize },
    Refusal,
    LanguageMismatch { expected: String, detected: String },
    Placeholder(String),
    FutureIntent,
}

impl InvalidReason {
    pub fn is_language_mismatch(&self) -> bool {
        matches!(self, Self::LanguageMismatch { .. })
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { chars } => write!(f, "response too short ({chars} chars)"),
            Self::Refusal => f.write_str("response is a refusal"),
            Self::LanguageMismatch { expected, detected } => {
                write!(f, "response written in {detected}, project expects {expected}")
            }
            Self::Placeholder(found) => write!(f, "response contains placeholder `{found}`"),
            Self::FutureIntent => f.write_str("response describes future work instead of doing it"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(InvalidReason),
}

#[derive(Debug, Clone)]
pub struct ResponseValidator {
    project_language: Option<CodeLanguage>,
    natural_language: Option<String>,
    min_chars: usize,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ResponseValidator {
    pub fn new(project_language: Option<&str>, natural_language: Option<&str>) -> Self {
        Self {
            project_language: project_language.and_then(CodeLanguage::parse),
            natural_language: natural_language.map(|l| l.trim().to_lowercase()),
            min_chars: DEFAULT_MIN_RESPONSE_CHARS,
        }
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn project_language(&self) -> Option<CodeLanguage> {
        self.project_language
    }

    /// Checks run in order: length, refusal, language, placeholders,
    /// future intent. The first failing check decides.
    pub fn validate(&self, output: &str, task: &Task) -> Verdict {
        let trimmed = output.trim();
        let chars = trimmed.chars().count();
        if chars < self.min_chars {
            return Verdict::Invalid(InvalidReason::TooShort { chars });
        }

        if REFUSAL.is_match(trimmed) {
            return Verdict::Invalid(InvalidReason::Refusal);
        }

        if let Some(reason) = self.language_mismatch(trimmed) {
            return Verdict::Invalid(reason);
        }

        if let Some(found) = PLACEHOLDER.find(trimmed) {
            // A task that itself talks about placeholders may echo them.
            if !task
                .description
                .to_lowercase()
                .contains(&found.as_str().to_lowercase())
            {
                return Verdict::Invalid(InvalidReason::Placeholder(found.as_str().to_string()));
            }
        }

        if FUTURE_INTENT.is_match(trimmed) && !trimmed.contains("```") && !trimmed.contains("[WRITE:")
        {
            return Verdict::Invalid(InvalidReason::FutureIntent);
        }

        Verdict::Valid
    }

    fn language_mismatch(&self, output: &str) -> Option<InvalidReason> {
        if let Some(expected) = self.project_language {
            if let Some(detected) = detect_code_language(output) {
                if !expected.compatible_with(detected) {
                    return Some(InvalidReason::LanguageMismatch {
                        expected: expected.to_string(),
                        detected: detected.to_string(),
                    });
                }
            }
        }

        if self.natural_language.as_deref().is_some_and(is_english) {
            let ratio = foreign_script_ratio(output);
            if ratio > FOREIGN_SCRIPT_RATIO {
                return Some(InvalidReason::LanguageMismatch {
                    expected: "English".into(),
                    detected: "non-Latin script".into(),
                });
            }
        }

        None
    }
}

fn is_english(tag: &str) -> bool {
    let tag = tag.trim();
    tag.eq_ignore_ascii_case("en")
        || tag.eq_ignore_ascii_case("english")
        || tag
            .get(..3)
            .is_some_and(|p| p.eq_ignore_ascii_case("en-") || p.eq_ignore_ascii_case("en_"))
}

/// Fence tags win; otherwise the language with the most distinct markers
/// (at least two) is reported.
pub fn detect_code_language(output: &str) -> Option<CodeLanguage> {
    for caps in FENCE_TAG.captures_iter(output) {
        if let Some(lang) = CodeLanguage::parse(&caps[1]) {
            return Some(lang);
        }
    }

    let mut best: Option<(CodeLanguage, usize)> = None;
    for lang in CodeLanguage::ALL {
        let score = lang.markers().iter().filter(|re| re.is_match(output)).count();
        if score >= 2 && best.map_or(true, |(_, top)| score > top) {
            best = Some((lang, score));
        }
    }
    best.map(|(lang, _)| lang)
}

fn foreign_script_ratio(text: &str) -> f32 {
    let mut letters = 0usize;
    let mut foreign = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if is_cjk_or_cyrillic(c) {
            foreign += 1;
        }
    }
    if letters == 0 {
        0.0
    } else {
        foreign as f32 / letters as f32
    }
}

fn is_cjk_or_cyrillic(c: char) -> bool {
    matches!(c,
        '\u{0400}'..='\u{04FF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::AgentRole;

    const PYTHON: &str = "def load(path):\n    with open(path) as f:\n        return f.read()\n\nif __name__ == '__main__':\n    print(load('a.txt'))\n";
    const TYPESCRIPT: &str = "export interface User {\n  name: string;\n}\n\nexport const greet = (u: User): string => `hi ${u.name}`;\n";

    fn task() -> Task {
        Task::new(1, AgentRole::Coder, "write the loader")
    }

    fn ts_validator() -> ResponseValidator {
        ResponseValidator::new(Some("typescript"), Some("en"))
    }

    #[test]
    fn detects_languages() {
        assert_eq!(detect_code_language(PYTHON), Some(CodeLanguage::Python));
        assert_eq!(detect_code_language(TYPESCRIPT), Some(CodeLanguage::TypeScript));
        assert_eq!(detect_code_language("Just some prose about the plan."), None);
        assert_eq!(
            detect_code_language("```rust\nfn main() {}\n```"),
            Some(CodeLanguage::Rust)
        );
    }

    #[test]
    fn too_short_comes_first() {
        assert_eq!(
            ts_validator().validate("  ok ", &task()),
            Verdict::Invalid(InvalidReason::TooShort { chars: 2 })
        );
    }

    #[test]
    fn refusal_at_start() {
        assert_eq!(
            ts_validator().validate("I'm sorry, but I cannot help with that request.", &task()),
            Verdict::Invalid(InvalidReason::Refusal)
        );
        assert_eq!(
            ts_validator().validate("Here is the file. I'm sorry it took long.", &task()),
            Verdict::Valid
        );
    }

    #[test]
    fn python_for_typescript_project_is_mismatch() {
        match ts_validator().validate(PYTHON, &task()) {
            Verdict::Invalid(reason) => assert!(reason.is_language_mismatch()),
            Verdict::Valid => panic!("python accepted for a typescript project"),
        }
        assert_eq!(ts_validator().validate(TYPESCRIPT, &task()), Verdict::Valid);
    }

    #[test]
    fn foreign_prose_for_english_project() {
        let verdict = ts_validator().validate("这是一个完整的实现方案，包含所有文件。", &task());
        assert!(matches!(
            verdict,
            Verdict::Invalid(InvalidReason::LanguageMismatch { .. })
        ));
    }

    #[test]
    fn english_tag_spellings_all_enable_the_script_check() {
        let foreign = "这是一个完整的实现方案，包含所有文件。";
        for tag in ["en", "EN", "English", "en-US"] {
            let verdict = ResponseValidator::new(None, Some(tag)).validate(foreign, &task());
            assert!(
                matches!(verdict, Verdict::Invalid(InvalidReason::LanguageMismatch { .. })),
                "tag {tag} skipped the check"
            );
        }
        assert_eq!(
            ResponseValidator::new(None, Some("zh")).validate(foreign, &task()),
            Verdict::Valid
        );
    }

    #[test]
    fn placeholders_and_future_intent() {
        assert!(matches!(
            ts_validator().validate("const key = 'YOUR_API_KEY_HERE';\nfetch(url)", &task()),
            Verdict::Invalid(InvalidReason::Placeholder(_))
        ));
        assert_eq!(
            ts_validator().validate("I will create the loader module next.", &task()),
            Verdict::Invalid(InvalidReason::FutureIntent)
        );
        assert_eq!(
            ts_validator().validate(
                "I will create the loader:\n[WRITE: src/a.ts]\nexport const a = 1;\n[/WRITE]",
                &task()
            ),
            Verdict::Valid
        );
    }
}
