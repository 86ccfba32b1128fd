//! Data structures for the plagiarized-code detection pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tunable parameters of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Near-duplicate tolerance as a fraction of the longer block's normalized length.
    pub tolerance: f64,
    /// z-score a pair must exceed to be flagged as an outlier.
    pub outlier_threshold: f64,
    /// A reportable block spans strictly more lines than this.
    pub min_block_lines: usize,
    /// A reportable block has fewer variants than this share of the corpus.
    pub max_owner_ratio: f64,
    /// A reportable block has strictly more variants than this.
    pub min_similarity_count: usize,
    pub excerpt_chars: usize,
    /// Worker threads for the pair stage (None = all cores).
    pub threads: Option<usize>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            tolerance: 0.3,
            outlier_threshold: 3.0,
            min_block_lines: 2,
            max_owner_ratio: 0.8,
            min_similarity_count: 1,
            excerpt_chars: 120,
            threads: None,
        }
    }
}

/// Which text a score was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Raw,
    Normalized,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Raw, Dimension::Normalized];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Raw => "raw",
            Dimension::Normalized => "normalized",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-mille dissimilarity of one submission pair (0 = identical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PairScore {
    pub raw: u32,
    pub normalized: u32,
}

impl PairScore {
    pub fn get(&self, dimension: Dimension) -> u32 {
        match dimension {
            Dimension::Raw => self.raw,
            Dimension::Normalized => self.normalized,
        }
    }
}

/// Symmetric pair-to-score mapping. Both orientations of every pair are
/// stored explicitly and self-pairs never are.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
    scores: BTreeMap<(String, String), PairScore>,
}

impl SimilarityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the score of `(a, b)` and `(b, a)`. Returns false for a self-pair.
    pub fn insert(&mut self, a: &str, b: &str, score: PairScore) -> bool {
        if a == b {
            return false;
        }
        self.scores.insert((a.to_string(), b.to_string()), score);
        self.scores.insert((b.to_string(), a.to_string()), score);
        true
    }

    pub fn get(&self, a: &str, b: &str) -> Option<PairScore> {
        self.scores.get(&(a.to_string(), b.to_string())).copied()
    }

    /// Number of unordered pairs.
    pub fn len(&self) -> usize {
        self.scores.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Every unordered pair once, with `a < b`, in name order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, PairScore)> {
        self.scores
            .iter()
            .filter(|((a, b), _)| a < b)
            .map(|((a, b), score)| (a.as_str(), b.as_str(), *score))
    }

    /// Scores of every unordered pair along one dimension.
    pub fn values(&self, dimension: Dimension) -> Vec<u32> {
        self.pairs().map(|(_, _, s)| s.get(dimension)).collect()
    }

    pub fn entries(&self) -> Vec<MatrixEntry> {
        self.pairs()
            .map(|(a, b, s)| MatrixEntry {
                a: a.to_string(),
                b: b.to_string(),
                raw: s.raw,
                normalized: s.normalized,
            })
            .collect()
    }
}

/// Flat matrix row for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub a: String,
    pub b: String,
    pub raw: u32,
    pub normalized: u32,
}

/// A pair that is more similar than the rest of the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFinding {
    pub a: String,
    pub b: String,
    pub score: u32,
    pub z_score: f64,
}

impl OutlierFinding {
    /// The other side of the pair, if `name` is part of it.
    pub fn partner(&self, name: &str) -> Option<&str> {
        if self.a == name {
            Some(&self.b)
        } else if self.b == name {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Ranked outliers along one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub dimension: Dimension,
    pub median: f64,
    pub stdev: f64,
    pub threshold: f64,
    /// Sorted by descending z-score.
    pub findings: Vec<OutlierFinding>,
}

impl OutlierReport {
    pub fn empty(dimension: Dimension, threshold: f64) -> Self {
        Self {
            dimension,
            median: 0.0,
            stdev: 0.0,
            threshold,
            findings: Vec::new(),
        }
    }

    /// Flagged partners of one submission, best first.
    pub fn partners_of<'a>(&'a self, name: &str) -> Vec<(&'a str, &'a OutlierFinding)> {
        self.findings
            .iter()
            .filter_map(|f| f.partner(name).map(|p| (p, f)))
            .collect()
    }
}

/// Another submission owning a near-duplicate of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMatch {
    pub submission: String,
    /// Excerpt of the variant that submission owns.
    pub excerpt: String,
    /// Whether the variant is byte-identical to the reported block.
    pub exact: bool,
}

/// A block that is evidence of likely copying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFinding {
    pub excerpt: String,
    pub similarity_count: usize,
    pub line_count: usize,
    pub matches: Vec<BlockMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFindings {
    pub submission: String,
    pub blocks: Vec<BlockFinding>,
}

/// A pair whose comparison failed and is missing from the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub a: String,
    pub b: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub submission_count: usize,
    pub excluded_submissions: usize,
    pub excluded_files: usize,
    pub pair_count: usize,
    pub skipped_pairs: usize,
    pub distinct_blocks: usize,
    pub reportable_blocks: usize,
    pub raw_outliers: usize,
    pub normalized_outliers: usize,
}

/// Full result of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub version: String,
    pub parameters: DetectionParams,
    pub summary: DetectionSummary,
    pub matrix: Vec<MatrixEntry>,
    pub raw_outliers: OutlierReport,
    pub normalized_outliers: OutlierReport,
    pub block_findings: Vec<SubmissionFindings>,
    pub skipped: Vec<SkippedPair>,
    /// Names of submissions dropped for lack of comparable files.
    pub excluded: Vec<String>,
}

impl DetectionReport {
    pub fn outliers(&self, dimension: Dimension) -> &OutlierReport {
        match dimension {
            Dimension::Raw => &self.raw_outliers,
            Dimension::Normalized => &self.normalized_outliers,
        }
    }
}
