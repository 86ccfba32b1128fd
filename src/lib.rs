//! plagiarized-code: near-duplicate source code detection
//!
//! Detects copied code across a corpus of independently authored
//! submissions. Each file is normalized per language so that formatting
//! differences vanish, split into blocks, and compared:
//!
//! - every pair of submissions gets a raw and a normalized score, computed
//!   in parallel, and pairs far more similar than the corpus median are
//!   ranked as outliers;
//! - every distinct block is tracked across the corpus, and blocks shared by
//!   a few submissions (but not by nearly everyone) are reported.
//!
//! # Example
//!
//! ```no_run
//! use plagiarized_code::prelude::*;
//! use std::path::Path;
//!
//! let submissions = load_submissions(Path::new("assignments/week3")).unwrap();
//! let params = DetectionParams::default();
//!
//! let report = detect(submissions, &params, false).unwrap();
//!
//! for finding in &report.normalized_outliers.findings {
//!     println!("{} <-> {} (z = {:.1})", finding.a, finding.b, finding.z_score);
//! }
//! ```

pub mod cfamily;
pub mod compare;
pub mod config;
pub mod detect;
pub mod distance;
pub mod lexer;
pub mod loader;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod outlier;
pub mod output;
pub mod python;
pub mod source;
pub mod tracker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::compare::{
        all_pairs, compare_pair, compare_submissions, CompareError, ComparisonOutcome,
    };
    pub use crate::config::{load_params, params_from_toml, validate, ConfigError, ParamOverrides};
    pub use crate::detect::{detect, DetectError, RunContext};
    pub use crate::distance::{distance, normalized_len, similar, submission_score, tolerance};
    pub use crate::loader::{classify, load_submission, load_submissions, LoaderError};
    pub use crate::models::{
        BlockFinding, BlockMatch, DetectionParams, DetectionReport, DetectionSummary, Dimension,
        MatrixEntry, OutlierFinding, OutlierReport, PairScore, SimilarityMatrix, SkippedPair,
        SubmissionFindings,
    };
    pub use crate::normalize::Language;
    pub use crate::outlier::score_outliers;
    pub use crate::output::{
        format_finding, print_block_findings, print_outliers, print_summary, truncate_text,
        write_json, write_json_file, write_matrix_csv, write_matrix_csv_file,
        write_normalized_dump, OutputError,
    };
    pub use crate::source::{SourceError, SourceFile, Submission};
    pub use crate::tracker::BlockRegistry;
}

// Re-export commonly used types at the crate root
pub use detect::{detect, RunContext};
pub use models::{DetectionParams, DetectionReport, Dimension, SimilarityMatrix};
pub use normalize::Language;
pub use source::{SourceFile, Submission};
