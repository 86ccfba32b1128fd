//! Dialect-driven tokenizer shared by the language normalizers.
//!
//! The lexer only knows enough about a language to find comment, string and
//! directive boundaries. Everything else is a word, a number or punctuation.
//! Backslash-newline splices are removed in every state, so a directive or a
//! line comment ending in `\` continues onto the next physical line.

use tracing::warn;

/// Lexical rules for one language family.
#[derive(Debug)]
pub struct Dialect {
    /// Marker that starts a comment running to the end of the line.
    pub line_comment: &'static str,
    /// Whether `/* ... */` comments exist.
    pub block_comments: bool,
    /// Whether `'''` / `"""` strings exist (and may span lines).
    pub triple_quotes: bool,
    /// Whether a `#` first on a line starts a preprocessor directive.
    pub directives: bool,
    /// Multi-character operators, longest first.
    pub operators: &'static [&'static str],
    /// Identifiers that prefix a string literal when written directly before a quote.
    pub string_prefixes: &'static [&'static str],
    /// Whether a prefix ending in `R` starts a C++ raw string `R"delim(...)delim"`.
    pub raw_strings: bool,
    /// Whether `'` may separate digits inside a number (`1'000'000`).
    pub digit_separators: bool,
}

impl Dialect {
    /// Whether writing `prev` directly followed by `next` would lex differently.
    pub fn fuses(&self, prev: &str, next: &str) -> bool {
        let (Some(last), Some(first)) = (prev.chars().last(), next.chars().next()) else {
            return false;
        };
        let mut joined = String::with_capacity(2);
        joined.push(last);
        joined.push(first);

        if self.line_comment.contains(joined.as_str()) && self.line_comment.len() > 1 {
            return true;
        }
        if self.block_comments && (joined == "/*" || joined == "*/") {
            return true;
        }
        self.operators.iter().any(|op| op.contains(joined.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    Str,
    Punct,
    /// A whole preprocessor line, comments removed and whitespace collapsed.
    Directive,
    /// A physical line break outside strings and comments.
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Visual column (tabs advance to the next multiple of 8) when the token
    /// is the first one on its line, otherwise 0.
    pub col: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            col,
        }
    }

    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

/// Tokenize `src` according to `dialect`.
///
/// Never loops: a step that consumes nothing aborts with a diagnostic and
/// returns the tokens produced so far.
pub fn tokenize(src: &str, dialect: &Dialect) -> Vec<Token> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut line_start = 0usize;
    let mut at_line_start = true;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];

        if let Some(len) = splice_len(bytes, i) {
            i += len;
            line_start = i;
            continue;
        }

        if b == b'\n' {
            tokens.push(Token::new(TokenKind::Newline, "\n", 0));
            i += 1;
            line_start = i;
            at_line_start = true;
            continue;
        }

        if b.is_ascii_whitespace() || b == 0x0b {
            i += 1;
            continue;
        }

        if bytes[i..].starts_with(dialect.line_comment.as_bytes()) {
            i = skip_line_comment(bytes, i);
            continue;
        }

        if dialect.block_comments && bytes[i..].starts_with(b"/*") {
            i = skip_block_comment(bytes, i);
            continue;
        }

        let col = if at_line_start {
            visual_width(&bytes[line_start..i])
        } else {
            0
        };

        if dialect.directives && at_line_start && b == b'#' {
            let (end, text) = scan_directive(bytes, i, dialect);
            tokens.push(Token::new(TokenKind::Directive, text, col));
            i = end;
        } else if b == b'"' || b == b'\'' {
            let (end, text) = scan_string(bytes, i, dialect);
            tokens.push(Token::new(TokenKind::Str, text, col));
            i = end;
        } else if b.is_ascii_digit()
            || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            let end = scan_number(bytes, i, dialect);
            tokens.push(Token::new(TokenKind::Number, &src[i..end], col));
            i = end;
        } else if is_word_byte(b) {
            let end = scan_while(bytes, i + 1, is_word_byte);
            let word = &src[i..end];
            let quoted = matches!(bytes.get(end), Some(b'"') | Some(b'\''));
            if quoted && dialect.string_prefixes.contains(&word) {
                let raw = (dialect.raw_strings && word.ends_with('R') && bytes[end] == b'"')
                    .then(|| scan_raw_string(bytes, end))
                    .flatten();
                let (str_end, text) = raw.unwrap_or_else(|| scan_string(bytes, end, dialect));
                tokens.push(Token::new(TokenKind::Str, format!("{word}{text}"), col));
                i = str_end;
            } else {
                tokens.push(Token::new(TokenKind::Word, word, col));
                i = end;
            }
        } else {
            let len = dialect
                .operators
                .iter()
                .find(|op| bytes[i..].starts_with(op.as_bytes()))
                .map_or(1, |op| op.len());
            tokens.push(Token::new(TokenKind::Punct, &src[i..i + len], col));
            i += len;
        }
        at_line_start = false;

        if i <= start {
            warn!(offset = start, "tokenizer made no progress, truncating input");
            break;
        }
    }

    tokens
}

#[inline]
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

#[inline]
fn scan_while(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}

/// Length of a backslash-newline splice starting at `i`, if any.
#[inline]
fn splice_len(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes[i] != b'\\' {
        return None;
    }
    match (bytes.get(i + 1), bytes.get(i + 2)) {
        (Some(b'\n'), _) => Some(2),
        (Some(b'\r'), Some(b'\n')) => Some(3),
        _ => None,
    }
}

fn visual_width(prefix: &[u8]) -> usize {
    prefix.iter().fold(0, |col, &b| match b {
        b'\t' => (col / 8 + 1) * 8,
        _ => col + 1,
    })
}

/// Returns the index of the newline that ends the comment (or the input end).
fn skip_line_comment(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        match splice_len(bytes, i) {
            Some(len) => i += len,
            None => i += 1,
        }
    }
    i
}

fn skip_block_comment(bytes: &[u8], i: usize) -> usize {
    let body = i + 2;
    bytes[body..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |pos| body + pos + 2)
}

/// Scan a string literal starting at the quote at `i`.
///
/// Splices are dropped from the literal; everything else is kept verbatim.
/// Single-quoted literals stop at an unescaped newline, which leaves an
/// unterminated literal rather than swallowing the rest of the file.
fn scan_string(bytes: &[u8], i: usize, dialect: &Dialect) -> (usize, String) {
    let quote = bytes[i];
    let triple = dialect.triple_quotes && bytes[i..].starts_with(&[quote, quote, quote]);
    let open_len = if triple { 3 } else { 1 };

    let mut out = bytes[i..i + open_len].to_vec();
    let mut j = i + open_len;
    while j < bytes.len() {
        if let Some(len) = splice_len(bytes, j) {
            j += len;
            continue;
        }
        let c = bytes[j];
        if c == b'\\' && j + 1 < bytes.len() {
            out.extend_from_slice(&bytes[j..j + 2]);
            j += 2;
            continue;
        }
        if c == b'\n' && !triple {
            break;
        }
        if triple && bytes[j..].starts_with(&[quote, quote, quote]) {
            out.extend_from_slice(&bytes[j..j + 3]);
            j += 3;
            return (j, String::from_utf8_lossy(&out).into_owned());
        }
        out.push(c);
        j += 1;
        if c == quote && !triple {
            break;
        }
    }
    (j, String::from_utf8_lossy(&out).into_owned())
}

/// Scan a number starting at `i`, suffixes and digit separators included.
fn scan_number(bytes: &[u8], i: usize, dialect: &Dialect) -> usize {
    let mut j = i + 1;
    while j < bytes.len() {
        let c = bytes[j];
        let separator = dialect.digit_separators
            && c == b'\''
            && bytes[j - 1].is_ascii_alphanumeric()
            && bytes.get(j + 1).is_some_and(u8::is_ascii_alphanumeric);
        if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || separator {
            j += 1;
        } else {
            break;
        }
    }
    j
}

/// Longest delimiter a C++ raw string may carry.
const MAX_RAW_DELIMITER: usize = 16;

/// Scan a C++ raw string whose opening quote is at `i`.
///
/// Returns `None` when no valid `delim(` follows the quote, so the caller can
/// fall back to an ordinary literal. The body is kept verbatim, newlines
/// included; an unterminated raw string runs to the end of input.
fn scan_raw_string(bytes: &[u8], i: usize) -> Option<(usize, String)> {
    let open = i + 1;
    let paren = bytes[open..]
        .iter()
        .take(MAX_RAW_DELIMITER + 1)
        .position(|&c| c == b'(')?;
    let delim = &bytes[open..open + paren];
    if delim
        .iter()
        .any(|&c| c.is_ascii_whitespace() || matches!(c, b')' | b'\\' | b'"'))
    {
        return None;
    }

    let mut close = Vec::with_capacity(delim.len() + 2);
    close.push(b')');
    close.extend_from_slice(delim);
    close.push(b'"');

    let body = open + paren + 1;
    let end = bytes[body..]
        .windows(close.len())
        .position(|w| w == close.as_slice())
        .map_or(bytes.len(), |pos| body + pos + close.len());
    Some((end, String::from_utf8_lossy(&bytes[i..end]).into_owned()))
}

/// Scan a preprocessor directive starting at the `#` at `i`.
///
/// Returns the index of the terminating newline and the cleaned directive:
/// comments removed, whitespace outside literals collapsed, `# include`
/// folded to `#include`.
fn scan_directive(bytes: &[u8], i: usize, dialect: &Dialect) -> (usize, String) {
    let mut out = String::new();
    let mut pending_space = false;
    let mut j = i;

    while j < bytes.len() && bytes[j] != b'\n' {
        if let Some(len) = splice_len(bytes, j) {
            j += len;
            pending_space = true;
            continue;
        }
        let c = bytes[j];
        if bytes[j..].starts_with(dialect.line_comment.as_bytes()) {
            j = skip_line_comment(bytes, j);
            break;
        }
        if dialect.block_comments && bytes[j..].starts_with(b"/*") {
            j = skip_block_comment(bytes, j);
            pending_space = true;
            continue;
        }
        if c.is_ascii_whitespace() {
            pending_space = true;
            j += 1;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        if c == b'"' || c == b'\'' {
            let (end, text) = scan_string(bytes, j, dialect);
            out.push_str(&text);
            j = end;
        } else {
            // Copy one whole UTF-8 sequence so multi-byte chars survive.
            let len = utf8_len(c);
            let end = (j + len).min(bytes.len());
            out.push_str(&String::from_utf8_lossy(&bytes[j..end]));
            j = end;
        }
    }

    let rest = out.strip_prefix('#').unwrap_or(&out).trim_start();
    (j, format!("#{rest}"))
}

#[inline]
fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}
