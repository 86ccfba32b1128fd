//! Source files and submissions.
//!
//! A [`SourceFile`] reads its raw text at most once and derives the
//! normalized text and block list from it on first access. The caches are
//! `OnceLock`s so the parallel warm-up in the scheduler can fill them from
//! worker threads. A [`Submission`] groups the files of one author.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, warn};

use crate::normalize::Language;

/// Errors that exclude a single file from comparison.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("{path} is neither UTF-8 nor Windows-1252 (byte {byte:#04x} at offset {offset})")]
    Decode {
        path: PathBuf,
        byte: u8,
        offset: usize,
    },
}

/// Windows-1252 code points for bytes 0x80..=0x9F. Zero marks an undefined byte.
const WINDOWS_1252_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Decode as Windows-1252, returning the offset of the first undefined byte on failure.
fn decode_windows_1252(bytes: &[u8]) -> Result<String, usize> {
    let mut text = String::with_capacity(bytes.len());
    for (offset, &b) in bytes.iter().enumerate() {
        let code = match b {
            0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
            _ => b as u32,
        };
        match char::from_u32(code) {
            Some(c) if code != 0 || b == 0 => text.push(c),
            _ => return Err(offset),
        }
    }
    Ok(text)
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Decode file bytes: UTF-8 first (BOM stripped), Windows-1252 as fallback.
/// Line endings are normalized to `\n`.
pub fn decode_source(path: &Path, bytes: &[u8]) -> Result<String, SourceError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!(path = %path.display(), "not valid UTF-8, retrying as Windows-1252");
            decode_windows_1252(bytes).map_err(|offset| SourceError::Decode {
                path: path.to_path_buf(),
                byte: bytes[offset],
                offset,
            })?
        }
    };
    Ok(normalize_newlines(&text))
}

/// One physical file with lazily derived views.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    language: Language,
    raw: OnceLock<Result<String, SourceError>>,
    normalized: OnceLock<String>,
    blocks: OnceLock<Vec<String>>,
}

impl SourceFile {
    /// A file whose text is read from disk on first access.
    pub fn new(path: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
            raw: OnceLock::new(),
            normalized: OnceLock::new(),
            blocks: OnceLock::new(),
        }
    }

    /// A file with in-memory text; nothing is read from disk.
    pub fn from_text(path: impl Into<PathBuf>, language: Language, text: &str) -> Self {
        let file = Self::new(path, language);
        let raw = if language.is_ignored() {
            String::new()
        } else {
            normalize_newlines(text)
        };
        let _ = file.raw.set(Ok(raw));
        file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn load(&self) -> Result<String, SourceError> {
        if self.language.is_ignored() {
            return Ok(String::new());
        }
        let loaded = fs::read(&self.path)
            .map_err(|e| SourceError::Read {
                path: self.path.clone(),
                message: e.to_string(),
            })
            .and_then(|bytes| decode_source(&self.path, &bytes));
        if let Err(e) = &loaded {
            warn!("excluding file: {e}");
        }
        loaded
    }

    /// Raw text, loaded on first call. Ignored files are never read.
    pub fn text(&self) -> Result<&str, &SourceError> {
        self.raw
            .get_or_init(|| self.load())
            .as_ref()
            .map(String::as_str)
    }

    pub fn is_readable(&self) -> bool {
        self.text().is_ok()
    }

    /// Normalized text; empty when the file could not be read.
    pub fn normalized_text(&self) -> &str {
        self.normalized.get_or_init(|| match self.text() {
            Ok(text) => self.language.normalize(text),
            Err(_) => String::new(),
        })
    }

    pub fn blocks(&self) -> &[String] {
        self.blocks
            .get_or_init(|| self.language.extract_blocks(self.normalized_text()))
    }
}

/// One named unit under comparison.
#[derive(Debug)]
pub struct Submission {
    name: String,
    files: Vec<SourceFile>,
    text: OnceLock<String>,
    normalized: OnceLock<String>,
    blocks: OnceLock<Vec<String>>,
}

impl Submission {
    /// Files are ordered by path.
    pub fn new(name: impl Into<String>, mut files: Vec<SourceFile>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            name: name.into(),
            files,
            text: OnceLock::new(),
            normalized: OnceLock::new(),
            blocks: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Files that carry evidence: classified, not ignored, and readable.
    fn evidence_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files
            .iter()
            .filter(|f| !f.language.is_ignored() && f.is_readable())
    }

    /// Raw texts of the evidence files joined with newlines.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| {
            self.evidence_files()
                .filter_map(|f| f.text().ok())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    pub fn normalized_text(&self) -> &str {
        self.normalized.get_or_init(|| {
            self.evidence_files()
                .map(SourceFile::normalized_text)
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    /// Blocks of every evidence file, in file order.
    pub fn blocks(&self) -> &[String] {
        self.blocks.get_or_init(|| {
            self.evidence_files()
                .flat_map(|f| f.blocks().iter().cloned())
                .collect()
        })
    }

    /// Number of files whose language is not `Ignored`.
    pub fn comparable_files(&self) -> usize {
        self.files.iter().filter(|f| !f.language.is_ignored()).count()
    }

    /// Number of comparable files that failed to load.
    pub fn excluded_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| !f.language.is_ignored() && !f.is_readable())
            .count()
    }

    /// True when no file contributes evidence.
    pub fn is_empty(&self) -> bool {
        self.evidence_files().next().is_none()
    }

    /// Fill every lazy cache.
    pub fn warm(&self) {
        self.text();
        self.normalized_text();
        self.blocks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_utf8_strips_bom_and_crlf() {
        let text = decode_source(Path::new("a.c"), b"\xEF\xBB\xBFint a;\r\nint b;\r").unwrap();
        assert_eq!(text, "int a;\nint b;\n");
    }

    #[test]
    fn test_decode_falls_back_to_windows_1252() {
        let text = decode_source(Path::new("a.c"), b"// caf\xE9 \x80\nint a;").unwrap();
        assert_eq!(text, "// caf\u{e9} \u{20ac}\nint a;");
    }

    #[test]
    fn test_decode_rejects_undefined_bytes() {
        let err = decode_source(Path::new("a.c"), b"ok \xFF \x81").unwrap_err();
        assert_eq!(
            err,
            SourceError::Decode {
                path: PathBuf::from("a.c"),
                byte: 0x81,
                offset: 5,
            }
        );
    }

    #[test]
    fn test_source_file_reads_from_disk_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.c");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"int main(){return 0;}").unwrap();

        let file = SourceFile::new(&path, Language::CFamily);
        assert_eq!(file.text().unwrap(), "int main(){return 0;}");
        fs::remove_file(&path).unwrap();
        assert!(file.is_readable());
        assert_eq!(file.normalized_text(), "int main() {\n    return 0;\n}");
        assert_eq!(file.blocks().len(), 1);
    }

    #[test]
    fn test_unreadable_file_is_contained() {
        let file = SourceFile::new("/nonexistent/dir/x.py", Language::PythonLike);
        assert!(matches!(file.text(), Err(SourceError::Read { .. })));
        assert_eq!(file.normalized_text(), "");
        assert!(file.blocks().is_empty());
    }

    #[test]
    fn test_ignored_file_never_touches_disk() {
        let file = SourceFile::new("/nonexistent/readme.md", Language::Ignored);
        assert_eq!(file.text().unwrap(), "");
        assert!(file.blocks().is_empty());
    }

    #[test]
    fn test_submission_orders_files_and_flattens_blocks() {
        let sub = Submission::new(
            "alice",
            vec![
                SourceFile::from_text("b.c", Language::CFamily, "int b;"),
                SourceFile::from_text("a.c", Language::CFamily, "int a;\nint c;"),
                SourceFile::from_text("notes.txt", Language::Ignored, "notes"),
            ],
        );
        assert_eq!(sub.files()[0].path(), Path::new("a.c"));
        assert_eq!(sub.text(), "int a;\nint c;\nint b;");
        assert_eq!(sub.blocks(), ["int a;", "int c;", "int b;"]);
        assert_eq!(sub.comparable_files(), 2);
        assert_eq!(sub.excluded_files(), 0);
        assert!(!sub.is_empty());
    }

    #[test]
    fn test_submission_without_evidence_is_empty() {
        let only_ignored = Submission::new(
            "bob",
            vec![SourceFile::from_text("report.pdf", Language::Ignored, "")],
        );
        assert!(only_ignored.is_empty());

        let unreadable = Submission::new(
            "carol",
            vec![SourceFile::new("/nonexistent/main.c", Language::CFamily)],
        );
        assert!(unreadable.is_empty());
        assert_eq!(unreadable.excluded_files(), 1);
    }
}
