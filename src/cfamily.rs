//! C-family normalization and block extraction.
//!
//! Brace-based languages lose all of their original layout: the token stream
//! is re-emitted with one statement per line, `(...)` and `[...]` kept on a
//! single line, and 4-space indentation per block brace. Preprocessor
//! directives stay on their own lines.

use tracing::warn;

use crate::lexer::{tokenize, Dialect, Token, TokenKind};
use crate::normalize::{append_token, next_line_len};

pub static C_DIALECT: Dialect = Dialect {
    line_comment: "//",
    block_comments: true,
    triple_quotes: false,
    directives: true,
    operators: &[
        ">>=", "<<=", "...", "->*", "<=>", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=",
        "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "::", ".*", "##",
    ],
    string_prefixes: &["L", "u", "U", "u8", "R", "LR", "uR", "UR", "u8R"],
    raw_strings: true,
    digit_separators: true,
};

const INDENT: &str = "    ";

/// Keywords whose braced body is followed by more of the same statement,
/// as in `typedef struct { ... } Point;`.
const DECLARATION_KEYWORDS: &[&str] = &["struct", "union", "enum", "class", "typedef"];

/// Open bracket that keeps its contents on the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inline {
    Paren,
    Square,
    Brace,
}

#[derive(Default)]
struct Emitter {
    lines: Vec<String>,
    current: String,
    depth: usize,
    inline: Vec<Inline>,
    prev: Option<Token>,
    /// Set right after a block `}` so `;`, `,`, `)` and `else` can join it.
    after_close: bool,
    /// Per open block brace: whether its `}` continues the statement.
    continues: Vec<bool>,
    /// The current line contains a declaration keyword.
    declaration: bool,
}

impl Emitter {
    fn flush(&mut self) {
        let line = self.current.trim_end();
        if !line.is_empty() {
            self.lines.push(format!("{}{}", INDENT.repeat(self.depth), line));
        }
        self.current.clear();
        self.declaration = false;
    }

    fn append(&mut self, token: &Token) {
        append_token(&mut self.current, self.prev.as_ref(), token, &C_DIALECT);
        if token.kind == TokenKind::Word && DECLARATION_KEYWORDS.contains(&token.text.as_str()) {
            self.declaration = true;
        }
        self.prev = Some(token.clone());
    }

    /// Whether the block brace about to open is closed by `} name;` or
    /// `} while (...);` rather than ending its statement. Function bodies
    /// follow a `)` and never continue.
    fn brace_continues(&self) -> bool {
        match &self.prev {
            Some(prev) if prev.is("do") => true,
            Some(prev) => self.declaration && !prev.is(")"),
            None => false,
        }
    }

    /// Whether a `{` here opens an initializer rather than a block.
    fn opens_inline_brace(&self) -> bool {
        if !self.inline.is_empty() {
            return true;
        }
        match &self.prev {
            Some(prev) if prev.kind == TokenKind::Punct => {
                matches!(prev.text.as_str(), "=" | ",")
            }
            Some(prev) => prev.kind == TokenKind::Word && prev.is("return"),
            None => false,
        }
    }

    fn push(&mut self, token: &Token) {
        if self.after_close {
            self.after_close = false;
            let joins = matches!(token.text.as_str(), ";" | "," | ")" | "else");
            if !joins {
                self.flush();
            }
        }

        match token.text.as_str() {
            "{" if token.kind == TokenKind::Punct => {
                if self.opens_inline_brace() {
                    self.append(token);
                    self.inline.push(Inline::Brace);
                } else {
                    self.continues.push(self.brace_continues());
                    if !self.current.is_empty() {
                        self.current.push(' ');
                    }
                    self.current.push('{');
                    self.prev = Some(token.clone());
                    self.flush();
                    self.depth += 1;
                }
            }
            "}" if token.kind == TokenKind::Punct => {
                if self.inline.pop().is_some() {
                    self.append(token);
                } else {
                    self.flush();
                    self.depth = self.depth.saturating_sub(1);
                    self.current.push('}');
                    self.prev = Some(token.clone());
                    // A continuing `}` keeps the rest of the statement up to `;`.
                    self.after_close = !self.continues.pop().unwrap_or(false);
                }
            }
            "(" | "[" if token.kind == TokenKind::Punct => {
                self.append(token);
                self.inline.push(if token.is("(") {
                    Inline::Paren
                } else {
                    Inline::Square
                });
            }
            ")" | "]" if token.kind == TokenKind::Punct => {
                self.append(token);
                self.inline.pop();
            }
            ";" if token.kind == TokenKind::Punct => {
                self.append(token);
                if self.inline.is_empty() {
                    self.flush();
                }
            }
            _ => self.append(token),
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.lines.join("\n")
    }
}

/// Normalize C-family source text.
pub fn normalize(text: &str) -> String {
    let mut emitter = Emitter::default();
    for token in tokenize(text, &C_DIALECT) {
        match token.kind {
            TokenKind::Newline => {}
            TokenKind::Directive => {
                emitter.after_close = false;
                emitter.flush();
                emitter.current.push_str(&token.text);
                emitter.flush();
            }
            _ => emitter.push(&token),
        }
    }
    emitter.finish()
}

/// Net `{`/`}` depth change of one normalized line. Braces inside literals
/// do not count.
fn brace_delta(line: &str) -> isize {
    tokenize(line, &C_DIALECT)
        .iter()
        .filter(|t| t.kind == TokenKind::Punct)
        .map(|t| match t.text.as_str() {
            "{" => 1,
            "}" => -1,
            _ => 0,
        })
        .sum()
}

/// Split normalized C-family text into top-level blocks.
///
/// A block ends when brace depth is back to zero on a line ending in `;` or
/// `}`. Directive lines are pulled out into their own block, and consecutive
/// directives share one. Unbalanced braces truncate extraction.
pub fn extract_blocks(normalized: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut directives = String::new();
    let mut depth = 0isize;
    let mut rest = normalized;

    while !rest.is_empty() {
        let consumed = next_line_len(rest);
        if consumed == 0 {
            warn!("block extraction made no progress, truncating");
            return blocks;
        }
        let line = rest[..consumed].trim_end_matches('\n');
        rest = &rest[consumed..];

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            directives.push_str(trimmed);
            directives.push('\n');
            continue;
        }
        flush_block(&mut blocks, &mut directives);

        depth += brace_delta(line);
        if depth < 0 {
            warn!("unbalanced closing brace, truncating block extraction");
            return blocks;
        }
        current.push_str(line);
        current.push('\n');

        if depth == 0 && (trimmed.ends_with(';') || trimmed.ends_with('}')) {
            flush_block(&mut blocks, &mut current);
        }
    }

    if depth != 0 {
        warn!(depth, "unclosed brace at end of input, truncating block extraction");
        flush_block(&mut blocks, &mut directives);
        return blocks;
    }
    flush_block(&mut blocks, &mut directives);
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

    const SAMPLE: &str = r#"#include <stdio.h>
#define SQUARE(x) \
    ((x) * (x))

/* Compute the sum
   of squares. */
int sum_squares(int n)
{
    int total = 0;   // running total
    for (int i = 0;
         i < n;
         i++) {
        total += SQUARE(i);
    }
    return total;
}

int main(void) {
    int values[] = { 1,
                     2, 3 };
    printf("%d {\n", sum_squares(values[2]));
    return 0;
}
"#;

    #[test]
    fn test_normalize_layout() {
        let normalized = normalize(SAMPLE);
        let expected = "\
#include <stdio.h>
#define SQUARE(x) ((x) * (x))
int sum_squares(int n) {
    int total = 0;
    for(int i = 0; i < n; i++) {
        total += SQUARE(i);
    }
    return total;
}
int main(void) {
    int values[] = {1, 2, 3};
    printf(\"%d {\\n\", sum_squares(values[2]));
    return 0;
}";
        assert_eq!(normalized, expected);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(SAMPLE);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_formatting_differences_vanish() {
        let a = "int f(int x){return x+1;}";
        let b = "int f( int x )\n{\n    // add one\n    return x + 1;\n}\n";
        assert_eq!(normalize(a), normalize(b));
    }

    #[test]
    fn test_else_and_struct_terminator_join_closing_brace() {
        let normalized = normalize("struct P { int x; };\nvoid f() { if (a) { b(); } else { c(); } }");
        assert_eq!(
            normalized,
            "struct P {\n    int x;\n};\nvoid f() {\n    if(a) {\n        b();\n    } else {\n        c();\n    }\n}"
        );
    }

    #[test]
    fn test_declaration_tail_stays_with_its_block() {
        let normalized = normalize(
            "typedef struct {\n int x;\n int y;\n} Point;\nstruct A { int v; } a, b;",
        );
        assert_eq!(
            normalized,
            "typedef struct {\n    int x;\n    int y;\n} Point;\nstruct A {\n    int v;\n} a, b;"
        );
        assert_eq!(
            extract_blocks(&normalized),
            vec![
                "typedef struct {\n    int x;\n    int y;\n} Point;",
                "struct A {\n    int v;\n} a, b;",
            ]
        );
    }

    #[test]
    fn test_do_while_and_struct_returning_function() {
        let normalized = normalize(
            "struct P make(int x) { struct P p; do { x--; } while (x > 0); return p; }\nint y;",
        );
        assert_eq!(
            normalized,
            "struct P make(int x) {\n    struct P p;\n    do {\n        x--;\n    } while(x > 0);\n    return p;\n}\nint y;"
        );
        assert_eq!(extract_blocks(&normalized).len(), 2);
        assert_eq!(normalize(&normalized), normalized);
    }

    #[test]
    fn test_extract_blocks() {
        let blocks = extract_blocks(&normalize(SAMPLE));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], "#include <stdio.h>\n#define SQUARE(x) ((x) * (x))");
        assert!(blocks[1].starts_with("int sum_squares(int n) {"));
        assert!(blocks[1].ends_with("return total;\n}"));
        assert!(blocks[2].starts_with("int main(void) {"));
    }

    #[test]
    fn test_extract_keeps_final_statement_without_terminator() {
        let blocks = extract_blocks("int a;\nFOO(b)");
        assert_eq!(blocks, vec!["int a;", "FOO(b)"]);
    }

    #[test]
    fn test_brace_in_string_does_not_count() {
        let blocks = extract_blocks("char *s = \"{\";\nint b;");
        assert_eq!(blocks, vec!["char *s = \"{\";", "int b;"]);
    }

    #[test]
    fn test_directive_inside_function_is_pulled_out() {
        let normalized = normalize("void f() {\n#ifdef DEBUG\n    log();\n#endif\n}\n");
        let blocks = extract_blocks(&normalized);
        assert_eq!(
            blocks,
            vec!["#ifdef DEBUG", "#endif", "void f() {\n    log();\n}"]
        );
    }

    #[test]
    fn test_raw_string_and_digit_separators() {
        let normalized = normalize("auto s = R\"x(a\"b)\" }{)x\"; int c = 1'000'000;\nint m[] = {0xFF'FF};");
        assert_eq!(
            normalized,
            "auto s = R\"x(a\"b)\" }{)x\";\nint c = 1'000'000;\nint m[] = {0xFF'FF};"
        );
        assert_eq!(extract_blocks(&normalized).len(), 3);
    }

    #[test]
    fn test_unclosed_brace_truncates() {
        let blocks = extract_blocks("int a;\nvoid f() {\n    g();\n");
        assert_eq!(blocks, vec!["int a;"]);
    }

    #[test]
    fn test_stray_closing_brace_truncates() {
        let blocks = extract_blocks("int a;\n}\nint b;\n");
        assert_eq!(blocks, vec!["int a;"]);
    }
}
