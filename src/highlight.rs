//! Tree-sitter syntax highlighting for fenced code in model responses.
//!
//! [`Highlighter::highlight`] splits code into spans tagged with a
//! [`SyntaxKind`]; the spans always concatenate back to the input. Unknown
//! languages and highlighter failures yield `None` and callers print the
//! code unstyled.

use std::collections::HashMap;
use std::sync::LazyLock;

use colored::{ColoredString, Colorize};
use tree_sitter::Language;
use tree_sitter_highlight::{HighlightConfiguration, HighlightEvent};

const CAPTURE_NAMES: &[&str] = &[
    "attribute",
    "comment",
    "constant",
    "constant.builtin",
    "constructor",
    "function",
    "function.builtin",
    "function.method",
    "keyword",
    "number",
    "operator",
    "property",
    "punctuation",
    "punctuation.bracket",
    "punctuation.delimiter",
    "string",
    "string.special",
    "string.escape",
    "type",
    "type.builtin",
    "variable",
    "variable.builtin",
    "variable.parameter",
];

const BASH_HIGHLIGHTS_QUERY: &str = r#"
[(string) (raw_string) (heredoc_body) (heredoc_start)] @string
(command_name) @function
(variable_name) @property
["case" "do" "done" "elif" "else" "esac" "export" "fi" "for" "function" "if" "in" "select" "then" "unset" "until" "while"] @keyword
(comment) @comment
(function_definition name: (word) @function)
(file_descriptor) @number
["$" "&&" ">" ">>" "<" "|"] @operator
((command (_) @constant) (#match? @constant "^-"))
"#;

static LANG_ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("rs", "rust"),
        ("py", "python"),
        ("python3", "python"),
        ("js", "javascript"),
        ("jsx", "javascript"),
        ("node", "javascript"),
        ("ts", "typescript"),
        ("rb", "ruby"),
        ("erb", "ruby"),
        ("golang", "go"),
        ("sh", "bash"),
        ("shell", "bash"),
        ("zsh", "bash"),
        ("console", "bash"),
    ])
});

pub static HIGHLIGHTER: LazyLock<Highlighter> = LazyLock::new(Highlighter::new);

/// Highlight category of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Keyword,
    String,
    Comment,
    Function,
    Type,
    Number,
    Operator,
    Variable,
    Attribute,
    Punctuation,
    Constant,
}

/// A run of source text with at most one highlight category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span<'a> {
    pub kind: Option<SyntaxKind>,
    pub text: &'a str,
}

pub struct Highlighter {
    configs: HashMap<&'static str, HighlightConfiguration>,
}

impl Highlighter {
    fn new() -> Self {
        let mut configs = HashMap::new();

        let mut register = |name: &'static str,
                            language: Language,
                            highlights_query: &str,
                            injections_query: &str| {
            let mut config = match HighlightConfiguration::new(
                language,
                name.to_string(),
                highlights_query,
                injections_query,
                "",
            ) {
                Ok(config) => config,
                Err(e) => {
                    tracing::debug!(language = name, error = %e, "highlight query rejected");
                    return;
                }
            };
            config.configure(CAPTURE_NAMES);
            configs.insert(name, config);
        };

        register(
            "rust",
            tree_sitter_rust::LANGUAGE.into(),
            tree_sitter_rust::HIGHLIGHTS_QUERY,
            tree_sitter_rust::INJECTIONS_QUERY,
        );
        register(
            "python",
            tree_sitter_python::LANGUAGE.into(),
            tree_sitter_python::HIGHLIGHTS_QUERY,
            "",
        );
        register(
            "ruby",
            tree_sitter_ruby::LANGUAGE.into(),
            tree_sitter_ruby::HIGHLIGHTS_QUERY,
            "",
        );
        register(
            "javascript",
            tree_sitter_javascript::LANGUAGE.into(),
            tree_sitter_javascript::HIGHLIGHT_QUERY,
            tree_sitter_javascript::INJECTIONS_QUERY,
        );
        let typescript_query = format!(
            "{}\n{}",
            tree_sitter_typescript::HIGHLIGHTS_QUERY,
            tree_sitter_javascript::HIGHLIGHT_QUERY
        );
        register(
            "typescript",
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            &typescript_query,
            "",
        );
        register(
            "go",
            tree_sitter_go::LANGUAGE.into(),
            tree_sitter_go::HIGHLIGHTS_QUERY,
            "",
        );
        register(
            "json",
            tree_sitter_json::LANGUAGE.into(),
            tree_sitter_json::HIGHLIGHTS_QUERY,
            "",
        );
        register(
            "toml",
            tree_sitter_toml_ng::LANGUAGE.into(),
            tree_sitter_toml_ng::HIGHLIGHTS_QUERY,
            "",
        );
        register(
            "bash",
            tree_sitter_bash::LANGUAGE.into(),
            BASH_HIGHLIGHTS_QUERY,
            "",
        );

        Self { configs }
    }

    /// Canonical name of a supported language, resolving aliases.
    pub fn resolve(&self, lang: &str) -> Option<&'static str> {
        let lang_lower = lang.to_lowercase();
        let canonical = LANG_ALIASES
            .get(lang_lower.as_str())
            .copied()
            .unwrap_or(lang_lower.as_str());
        self.configs.get_key_value(canonical).map(|(name, _)| *name)
    }

    pub fn highlight<'a>(&self, lang: &str, code: &'a str) -> Option<Vec<Span<'a>>> {
        let config = self.configs.get(self.resolve(lang)?)?;

        let mut highlighter = tree_sitter_highlight::Highlighter::new();
        let events = highlighter
            .highlight(config, code.as_bytes(), None, |_| None)
            .ok()?;

        let mut spans = Vec::new();
        let mut kind_stack: Vec<Option<SyntaxKind>> = Vec::new();

        for event in events {
            match event.ok()? {
                HighlightEvent::Source { start, end } => {
                    let text = code.get(start..end)?;
                    let kind = kind_stack.last().copied().flatten();
                    spans.push(Span { kind, text });
                }
                HighlightEvent::HighlightStart(highlight) => {
                    kind_stack.push(capture_to_kind(highlight.0));
                }
                HighlightEvent::HighlightEnd => {
                    kind_stack.pop();
                }
            }
        }

        Some(spans)
    }
}

fn capture_to_kind(index: usize) -> Option<SyntaxKind> {
    let kind = match CAPTURE_NAMES.get(index).copied().unwrap_or_default() {
        "attribute" => SyntaxKind::Attribute,
        "comment" => SyntaxKind::Comment,
        "constant" | "constant.builtin" => SyntaxKind::Constant,
        "constructor" | "type" | "type.builtin" => SyntaxKind::Type,
        "function" | "function.builtin" | "function.method" => SyntaxKind::Function,
        "keyword" => SyntaxKind::Keyword,
        "number" => SyntaxKind::Number,
        "operator" => SyntaxKind::Operator,
        "property" | "variable" | "variable.builtin" | "variable.parameter" => {
            SyntaxKind::Variable
        }
        "punctuation" | "punctuation.bracket" | "punctuation.delimiter" => SyntaxKind::Punctuation,
        "string" | "string.special" | "string.escape" => SyntaxKind::String,
        _ => return None,
    };
    Some(kind)
}

/// Apply the terminal palette to one span.
pub fn paint(kind: Option<SyntaxKind>, text: &str) -> ColoredString {
    match kind {
        Some(SyntaxKind::Keyword) => text.truecolor(198, 120, 221).bold(),
        Some(SyntaxKind::String) => text.truecolor(152, 195, 121),
        Some(SyntaxKind::Comment) => text.truecolor(92, 99, 112).italic(),
        Some(SyntaxKind::Function) => text.truecolor(97, 175, 239),
        Some(SyntaxKind::Type) | Some(SyntaxKind::Attribute) => text.truecolor(229, 192, 123),
        Some(SyntaxKind::Number) | Some(SyntaxKind::Constant) => text.truecolor(209, 154, 102),
        Some(SyntaxKind::Operator) | Some(SyntaxKind::Punctuation) => {
            text.truecolor(171, 178, 191)
        }
        Some(SyntaxKind::Variable) => text.truecolor(224, 108, 117),
        None => text.normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(spans: &[Span<'_>]) -> String {
        spans.iter().map(|s| s.text).collect()
    }

    #[test]
    fn highlight_rust_code() {
        let spans = HIGHLIGHTER.highlight("rust", "let x = 42;").unwrap();
        assert!(!spans.is_empty());
        assert_eq!(joined(&spans), "let x = 42;");
        assert!(spans.iter().any(|s| s.kind == Some(SyntaxKind::Keyword)));
    }

    #[test]
    fn highlight_ruby_code() {
        let code = "class User\n  def name\n    \"bob\"\n  end\nend\n";
        let spans = HIGHLIGHTER.highlight("ruby", code).unwrap();
        assert_eq!(joined(&spans), code);
    }

    #[test]
    fn highlight_go_code() {
        let code = "package main\n\nfunc main() { fmt.Println(1) }\n";
        let spans = HIGHLIGHTER.highlight("go", code).unwrap();
        assert_eq!(joined(&spans), code);
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(HIGHLIGHTER.resolve("rs"), Some("rust"));
        assert_eq!(HIGHLIGHTER.resolve("RB"), Some("ruby"));
        assert_eq!(HIGHLIGHTER.resolve("Python"), Some("python"));
        assert_eq!(HIGHLIGHTER.resolve("sh"), Some("bash"));
    }

    #[test]
    fn unknown_language_returns_none() {
        assert!(HIGHLIGHTER.highlight("notalanguage123", "+++").is_none());
        assert!(HIGHLIGHTER.resolve("notalanguage123").is_none());
    }

    #[test]
    fn highlight_empty_string() {
        let spans = HIGHLIGHTER.highlight("rust", "").unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn malformed_code_no_panic() {
        let code = "fn {{{{ let !!!";
        let spans = HIGHLIGHTER.highlight("rust", code).unwrap();
        assert_eq!(joined(&spans), code);
    }

    #[test]
    fn paint_without_kind_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(paint(None, "x = 1").to_string(), "x = 1");
        assert_eq!(paint(Some(SyntaxKind::Keyword), "def").to_string(), "def");
    }
}
