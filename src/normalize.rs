//! Per-language source normalization.
//!
//! Every supported extension maps to one variant of the closed [`Language`]
//! set through a static table. Each variant knows how to normalize raw text
//! and how to split normalized text into blocks.

use serde::{Deserialize, Serialize};

use crate::cfamily;
use crate::lexer::{Dialect, Token, TokenKind};
use crate::python;

/// Language family of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Brace-based languages with an optional C preprocessor.
    CFamily,
    /// Indentation-significant languages.
    PythonLike,
    /// Known non-source files. They contribute no evidence.
    Ignored,
}

/// Extension table. Lookup is case-insensitive, without the leading dot.
/// The empty extension stands for files without one.
pub static EXTENSIONS: &[(&str, Language)] = &[
    ("c", Language::CFamily),
    ("h", Language::CFamily),
    ("cpp", Language::CFamily),
    ("hpp", Language::CFamily),
    ("cc", Language::CFamily),
    ("cxx", Language::CFamily),
    ("hh", Language::CFamily),
    ("hxx", Language::CFamily),
    ("ino", Language::CFamily),
    ("java", Language::CFamily),
    ("py", Language::PythonLike),
    ("pyw", Language::PythonLike),
    ("pyi", Language::PythonLike),
    ("", Language::Ignored),
    ("7z", Language::Ignored),
    ("cbp", Language::Ignored),
    ("csv", Language::Ignored),
    ("depend", Language::Ignored),
    ("iml", Language::Ignored),
    ("jpeg", Language::Ignored),
    ("jpg", Language::Ignored),
    ("json", Language::Ignored),
    ("layout", Language::Ignored),
    ("md", Language::Ignored),
    ("o", Language::Ignored),
    ("odp", Language::Ignored),
    ("ods", Language::Ignored),
    ("out", Language::Ignored),
    ("pdf", Language::Ignored),
    ("rar", Language::Ignored),
    ("sh", Language::Ignored),
    ("text", Language::Ignored),
    ("txt", Language::Ignored),
    ("xml", Language::Ignored),
    ("zip", Language::Ignored),
];

impl Language {
    /// Classify an extension. `None` means no handler claims it.
    pub fn from_extension(ext: &str) -> Option<Language> {
        EXTENSIONS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ext))
            .map(|&(_, lang)| lang)
    }

    /// Reduce raw source to its normalized form.
    pub fn normalize(self, text: &str) -> String {
        match self {
            Language::CFamily => cfamily::normalize(text),
            Language::PythonLike => python::normalize(text),
            Language::Ignored => String::new(),
        }
    }

    /// Split normalized text into trimmed, non-empty blocks.
    pub fn extract_blocks(self, normalized: &str) -> Vec<String> {
        match self {
            Language::CFamily => cfamily::extract_blocks(normalized),
            Language::PythonLike => python::extract_blocks(normalized),
            Language::Ignored => Vec::new(),
        }
    }

    pub fn is_ignored(self) -> bool {
        self == Language::Ignored
    }
}

/// Whether one space separates `prev` and `next` on a normalized line.
pub(crate) fn needs_space(prev: &Token, next: &Token, dialect: &Dialect) -> bool {
    let p = prev.text.as_str();
    let n = next.text.as_str();
    let punct = |t: &Token| t.kind == TokenKind::Punct;

    if punct(prev) && punct(next) && dialect.fuses(p, n) {
        return true;
    }
    // `1 .x` and `x. 5` would otherwise re-lex as numbers.
    if (prev.kind == TokenKind::Number && n == ".") || (p == "." && next.kind == TokenKind::Number) {
        return true;
    }
    if punct(next) && matches!(n, ")" | "]" | "}" | "," | ";" | ":") {
        return false;
    }
    if punct(prev) && matches!(p, "(" | "[" | "{" | "@" | "!" | "~") {
        return false;
    }
    if (punct(prev) && matches!(p, "." | "->" | "::")) || (punct(next) && matches!(n, "." | "->" | "::")) {
        return false;
    }
    let operand_end = matches!(prev.kind, TokenKind::Word | TokenKind::Number | TokenKind::Str)
        || (punct(prev) && matches!(p, ")" | "]"));
    if operand_end && punct(next) && matches!(n, "(" | "[" | "++" | "--") {
        return false;
    }
    true
}

/// Append `token` to a normalized line, inserting a separator if needed.
pub(crate) fn append_token(line: &mut String, prev: Option<&Token>, token: &Token, dialect: &Dialect) {
    if let Some(prev) = prev {
        if !line.is_empty() && needs_space(prev, token, dialect) {
            line.push(' ');
        }
    }
    line.push_str(&token.text);
}

/// Byte length of the next line of `text`, newline included.
pub(crate) fn next_line_len(text: &str) -> usize {
    text.find('\n').map_or(text.len(), |i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_table() {
        assert_eq!(Language::from_extension("cpp"), Some(Language::CFamily));
        assert_eq!(Language::from_extension("H"), Some(Language::CFamily));
        assert_eq!(Language::from_extension("py"), Some(Language::PythonLike));
        assert_eq!(Language::from_extension("pdf"), Some(Language::Ignored));
        assert_eq!(Language::from_extension(""), Some(Language::Ignored));
        assert_eq!(Language::from_extension("rs"), None);
    }

    #[test]
    fn test_extension_table_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for (ext, _) in EXTENSIONS {
            assert!(seen.insert(ext.to_ascii_lowercase()), "duplicate extension {ext}");
        }
    }

    #[test]
    fn test_ignored_language_is_inert() {
        assert_eq!(Language::Ignored.normalize("int main() {}"), "");
        assert!(Language::Ignored.extract_blocks("anything").is_empty());
    }

    #[test]
    fn test_dispatch_matches_family() {
        let c = Language::CFamily.normalize("int  x=1;");
        assert_eq!(c, "int x = 1;");
        let py = Language::PythonLike.normalize("x=1   # one\n");
        assert_eq!(py, "x = 1");
    }

    #[test]
    fn test_next_line_len() {
        assert_eq!(next_line_len("ab\ncd"), 3);
        assert_eq!(next_line_len("abcd"), 4);
        assert_eq!(next_line_len(""), 0);
    }
}
