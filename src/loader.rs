//! Corpus discovery.
//!
//! Every top-level entry of the input root becomes one [`Submission`],
//! named after its basename. Directories are walked recursively.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::normalize::Language;
use crate::source::{SourceFile, Submission};

/// Directory names that never contain submitted code.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "venv",
    "env",
    ".venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    "node_modules",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("input path not found: {0}")]
    NotFound(PathBuf),

    #[error("input root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

/// Classify a path by its extension. Files without one count as ignored.
pub fn classify(path: &Path) -> Option<Language> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    Language::from_extension(&ext)
}

fn classified_file(path: &Path) -> Option<SourceFile> {
    match classify(path) {
        Some(Language::Ignored) => {
            info!(path = %path.display(), "ignored file");
            Some(SourceFile::new(path, Language::Ignored))
        }
        Some(language) => Some(SourceFile::new(path, language)),
        None => {
            warn!(path = %path.display(), "unknown extension, skipping");
            None
        }
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load one submission from a directory or a single file.
pub fn load_submission(path: &Path) -> Result<Submission, LoaderError> {
    let name = entry_name(path);

    if path.is_file() {
        let files = classified_file(path).into_iter().collect();
        return Ok(Submission::new(name, files));
    }
    if !path.is_dir() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir() && is_ignored_dir(&e.file_name().to_string_lossy()))
        });
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", path.display());
                continue;
            }
        };
        if entry.file_type().is_file() {
            if let Some(file) = classified_file(entry.path()) {
                files.push(file);
            }
        }
    }
    debug!(submission = %name, files = files.len(), "loaded submission");
    Ok(Submission::new(name, files))
}

/// Load every top-level entry of `root` as a submission, sorted by name.
pub fn load_submissions(root: &Path) -> Result<Vec<Submission>, LoaderError> {
    if !root.exists() {
        return Err(LoaderError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(LoaderError::NotADirectory(root.to_path_buf()));
    }

    let entries = fs::read_dir(root).map_err(|source| LoaderError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut submissions = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", root.display());
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() && is_ignored_dir(&entry_name(&path)) {
            debug!(path = %path.display(), "ignoring directory");
            continue;
        }
        match load_submission(&path) {
            Ok(submission) => submissions.push(submission),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }

    submissions.sort_by(|a, b| a.name().cmp(b.name()));
    info!(count = submissions.len(), root = %root.display(), "loaded submissions");
    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, text: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a/b/main.CPP")), Some(Language::CFamily));
        assert_eq!(classify(Path::new("tool.py")), Some(Language::PythonLike));
        assert_eq!(classify(Path::new("Makefile")), Some(Language::Ignored));
        assert_eq!(classify(Path::new("lib.rs")), None);
    }

    #[test]
    fn test_load_submissions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("bob/src/main.c"), "int main(){return 0;}");
        write(&root.join("bob/README.md"), "# readme");
        write(&root.join("bob/build.rs"), "fn main() {}");
        write(&root.join("bob/.git/objects/x.c"), "int hidden;");
        write(&root.join("alice/venv/lib/site.py"), "import os");
        write(&root.join("alice/solve.py"), "print(1)");
        write(&root.join("carol.py"), "x = 1");
        fs::create_dir_all(root.join("__pycache__")).unwrap();

        let subs = load_submissions(root).unwrap();
        let names: Vec<&str> = subs.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol.py"]);

        assert_eq!(subs[0].files().len(), 1);
        assert_eq!(subs[1].files().len(), 2);
        assert_eq!(subs[1].comparable_files(), 1);
        assert_eq!(subs[2].text(), "x = 1");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let err = load_submissions(Path::new("/nonexistent/corpus")).unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }
}
