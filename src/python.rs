//! Normalization and block extraction for indentation-significant languages.

use tracing::warn;

use crate::lexer::{tokenize, Dialect, Token, TokenKind};
use crate::normalize::{append_token, next_line_len};

pub static PYTHON_DIALECT: Dialect = Dialect {
    line_comment: "#",
    block_comments: false,
    triple_quotes: true,
    directives: false,
    operators: &[
        "**=", "//=", ">>=", "<<=", "...", "->", ":=", "**", "//", "<<", ">>", "<=", ">=", "==",
        "!=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=",
    ],
    string_prefixes: &[
        "r", "u", "b", "f", "R", "U", "B", "F", "br", "rb", "fr", "rf", "Br", "bR", "BR", "Rb",
        "rB", "RB", "Fr", "fR", "FR", "Rf", "rF", "RF",
    ],
    raw_strings: false,
    digit_separators: false,
};

const INDENT: &str = "    ";

/// Top-level keywords that continue the preceding compound statement.
const CONTINUATION_KEYWORDS: &[&str] = &["else", "elif", "except", "finally"];

struct Emitter {
    lines: Vec<String>,
    current: String,
    level: usize,
    /// Indentation widths of the open levels, outermost first.
    widths: Vec<usize>,
    /// Bracket nesting; newlines inside brackets do not end the line.
    depth: usize,
    prev: Option<Token>,
}

impl Emitter {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: String::new(),
            level: 0,
            widths: vec![0],
            depth: 0,
            prev: None,
        }
    }

    /// Map a visual indentation width to a nesting level.
    fn indent_level(&mut self, width: usize) -> usize {
        while self.widths.len() > 1 && width < self.widths.last().copied().unwrap_or(0) {
            self.widths.pop();
        }
        if width > self.widths.last().copied().unwrap_or(0) {
            self.widths.push(width);
        }
        self.widths.len() - 1
    }

    fn flush(&mut self) {
        let line = self.current.trim_end();
        if !line.is_empty() {
            self.lines.push(format!("{}{}", INDENT.repeat(self.level), line));
        }
        self.current.clear();
        self.prev = None;
    }

    fn push(&mut self, token: Token) {
        if token.kind == TokenKind::Newline {
            if self.depth == 0 {
                self.flush();
            }
            return;
        }

        if self.current.is_empty() && self.depth == 0 {
            self.level = self.indent_level(token.col);
        }
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "(" | "[" | "{" => self.depth += 1,
                ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        append_token(&mut self.current, self.prev.as_ref(), &token, &PYTHON_DIALECT);
        self.prev = Some(token);
    }
}

/// Normalize Python-like source text.
///
/// Comments, blank lines and bracket-internal line breaks disappear; every
/// logical line is re-indented to four spaces per nesting level.
pub fn normalize(text: &str) -> String {
    let mut emitter = Emitter::new();
    for token in tokenize(text, &PYTHON_DIALECT) {
        emitter.push(token);
    }
    emitter.flush();
    emitter.lines.join("\n")
}

/// Track whether a triple-quoted string is still open after `line`.
fn triple_state_after(line: &str, mut open: Option<&'static str>) -> Option<&'static str> {
    let bytes = line.as_bytes();
    let mut single: Option<u8> = None;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(delim) = open {
            if b == b'\\' {
                i += 2;
            } else if bytes[i..].starts_with(delim.as_bytes()) {
                open = None;
                i += 3;
            } else {
                i += 1;
            }
            continue;
        }
        if let Some(quote) = single {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                single = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => {
                let delim = if b == b'"' { "\"\"\"" } else { "'''" };
                if bytes[i..].starts_with(delim.as_bytes()) {
                    open = Some(delim);
                    i += 3;
                } else {
                    single = Some(b);
                    i += 1;
                }
            }
            b'#' => break,
            _ => i += 1,
        }
    }
    open
}

fn first_word(line: &str) -> &str {
    line.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("")
}

/// Split normalized Python-like text into top-level blocks.
///
/// Each non-indented logical line starts a block, except `else`/`elif`/
/// `except`/`finally` and the line following a decorator, which join the
/// current one.
pub fn extract_blocks(normalized: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut open_string: Option<&'static str> = None;
    let mut after_decorator = false;
    let mut rest = normalized;

    while !rest.is_empty() {
        let consumed = next_line_len(rest);
        if consumed == 0 {
            warn!("block extraction made no progress, truncating");
            return blocks;
        }
        let line = rest[..consumed].trim_end_matches('\n');
        rest = &rest[consumed..];

        let inside_string = open_string.is_some();
        open_string = triple_state_after(line, open_string);

        if !inside_string {
            if line.trim().is_empty() {
                continue;
            }
            let top_level = !line.starts_with(char::is_whitespace);
            if top_level {
                let joins = after_decorator || CONTINUATION_KEYWORDS.contains(&first_word(line));
                if !joins {
                    flush_block(&mut blocks, &mut current);
                }
                after_decorator = line.starts_with('@');
            }
        }
        current.push_str(line);
        current.push('\n');
    }

    if open_string.is_some() {
        warn!("unterminated triple-quoted string, truncating block extraction");
        return blocks;
    }
    flush_block(&mut blocks, &mut current);
    blocks
}

fn flush_block(blocks: &mut Vec<String>, buffer: &mut String) {
    let block = buffer.trim();
    if !block.is_empty() {
        blocks.push(block.to_string());
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import os   # needed


def area(w,
         h):
  """Return the area."""
  if w <= 0:
      return 0
  else:
      return w*h

class Shape:
    @property
    def sides(self):
        return {'a': 1,
                'b': 2}
@decorator
def run():
    pass

try:
    run()
except ValueError:
    pass
x = area(2, 3)  \
    + 1
"#;

    const EXPECTED: &str = r#"import os
def area(w, h):
    """Return the area."""
    if w <= 0:
        return 0
    else:
        return w * h
class Shape:
    @property
    def sides(self):
        return {'a': 1, 'b': 2}
@decorator
def run():
    pass
try:
    run()
except ValueError:
    pass
x = area(2, 3) + 1"#;

    #[test]
    fn test_normalize_layout() {
        assert_eq!(normalize(SAMPLE), EXPECTED);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(SAMPLE);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_indentation_width_is_not_significant() {
        let two = "if a:\n  b = 1\n  if c:\n    d()\n";
        let tabs = "if a:\n\tb = 1\n\tif c:\n\t\td()\n";
        assert_eq!(normalize(two), normalize(tabs));
        assert_eq!(normalize(two), "if a:\n    b = 1\n    if c:\n        d()");
    }

    #[test]
    fn test_inconsistent_dedent_stays_nested() {
        let normalized = normalize("if a:\n        b()\n    c()\nd()\n");
        assert_eq!(normalized, "if a:\n    b()\n    c()\nd()");
    }

    #[test]
    fn test_extract_blocks() {
        let blocks = extract_blocks(EXPECTED);
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[0], "import os");
        assert!(blocks[1].starts_with("def area(w, h):"));
        assert!(blocks[1].ends_with("        return w * h"));
        assert!(blocks[2].starts_with("class Shape:"));
        assert_eq!(blocks[3], "@decorator\ndef run():\n    pass");
        assert_eq!(blocks[4], "try:\n    run()\nexcept ValueError:\n    pass");
        assert_eq!(blocks[5], "x = area(2, 3) + 1");
    }

    #[test]
    fn test_string_content_never_starts_a_block() {
        let blocks = extract_blocks("doc = '''\ntext at column zero\n'''\nz = 1");
        assert_eq!(blocks, vec!["doc = '''\ntext at column zero\n'''", "z = 1"]);
    }

    #[test]
    fn test_unterminated_string_truncates() {
        let blocks = extract_blocks("x = 1\ny = '''open\nmore\n");
        assert_eq!(blocks, vec!["x = 1"]);
    }

    #[test]
    fn test_final_statement_is_kept() {
        let blocks = extract_blocks("a = 1\nb = 2");
        assert_eq!(blocks, vec!["a = 1", "b = 2"]);
    }
}
