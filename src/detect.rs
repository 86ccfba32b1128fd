//! Run orchestration.
//!
//! A [`RunContext`] owns all run-scoped state: the submissions, the
//! parameters and the block registry. Nothing outlives it and nothing is
//! global, so two runs in one process never see each other.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{info, warn};

use crate::compare::{compare_submissions, warm_submissions, CompareError};
use crate::config::{validate, ConfigError};
use crate::models::{
    DetectionParams, DetectionReport, DetectionSummary, Dimension, SubmissionFindings,
};
use crate::outlier::score_outliers;
use crate::source::Submission;
use crate::tracker::BlockRegistry;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("duplicate submission name: {0}")]
    DuplicateSubmission(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compare(#[from] CompareError),
}

/// State of one detection run.
#[derive(Debug)]
pub struct RunContext {
    submissions: Vec<Submission>,
    excluded: Vec<Submission>,
    params: DetectionParams,
    registry: BlockRegistry,
}

impl RunContext {
    /// Validate the parameters and reject duplicate submission names.
    pub fn new(submissions: Vec<Submission>, params: DetectionParams) -> Result<Self, DetectError> {
        validate(&params)?;

        let mut names = HashSet::new();
        for submission in &submissions {
            if !names.insert(submission.name()) {
                return Err(DetectError::DuplicateSubmission(
                    submission.name().to_string(),
                ));
            }
        }

        let registry = BlockRegistry::new(params.tolerance);
        Ok(Self {
            submissions,
            excluded: Vec::new(),
            params,
            registry,
        })
    }

    /// Submissions taking part in comparison. Before [`RunContext::run`]
    /// this still includes submissions that will turn out to be empty.
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Drop submissions without evidence. Requires warm caches.
    fn exclude_empty(&mut self) {
        let (empty, comparable): (Vec<_>, Vec<_>) = std::mem::take(&mut self.submissions)
            .into_iter()
            .chain(std::mem::take(&mut self.excluded))
            .partition(Submission::is_empty);
        for submission in &empty {
            warn!(
                submission = submission.name(),
                "no comparable files, excluded from comparison"
            );
        }
        self.submissions = comparable;
        self.submissions.sort_by(|a, b| a.name().cmp(b.name()));
        self.excluded = empty;
        self.excluded.sort_by(|a, b| a.name().cmp(b.name()));
    }

    /// Execute the run: warm caches, score all pairs, feed the block
    /// registry, rank outliers and assemble the report.
    pub fn run(&mut self, show_progress: bool) -> Result<DetectionReport, DetectError> {
        warm_submissions(&self.submissions);
        self.exclude_empty();
        let count = self.submissions.len();
        info!(
            submissions = count,
            excluded = self.excluded.len(),
            "starting detection run"
        );

        let outcome = compare_submissions(&self.submissions, &self.params, show_progress)?;

        self.registry = BlockRegistry::new(self.params.tolerance);
        for submission in &self.submissions {
            self.registry.observe_submission(submission);
        }

        let threshold = self.params.outlier_threshold;
        let raw_outliers = score_outliers(&outcome.matrix, Dimension::Raw, threshold);
        let normalized_outliers = score_outliers(&outcome.matrix, Dimension::Normalized, threshold);

        let block_findings: Vec<SubmissionFindings> = self
            .submissions
            .iter()
            .map(|s| SubmissionFindings {
                submission: s.name().to_string(),
                blocks: self.registry.findings_for(s, count, &self.params),
            })
            .filter(|f| !f.blocks.is_empty())
            .collect();

        let summary = DetectionSummary {
            submission_count: count,
            excluded_submissions: self.excluded.len(),
            excluded_files: self
                .submissions
                .iter()
                .chain(&self.excluded)
                .map(Submission::excluded_files)
                .sum(),
            pair_count: outcome.matrix.len(),
            skipped_pairs: outcome.skipped.len(),
            distinct_blocks: self.registry.distinct_blocks(),
            reportable_blocks: self.registry.reportable_blocks(count, &self.params),
            raw_outliers: raw_outliers.findings.len(),
            normalized_outliers: normalized_outliers.findings.len(),
        };
        info!(
            pairs = summary.pair_count,
            skipped = summary.skipped_pairs,
            raw_outliers = summary.raw_outliers,
            normalized_outliers = summary.normalized_outliers,
            "detection run complete"
        );

        Ok(DetectionReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            parameters: self.params.clone(),
            summary,
            matrix: outcome.matrix.entries(),
            raw_outliers,
            normalized_outliers,
            block_findings,
            skipped: outcome.skipped,
            excluded: self.excluded.iter().map(|s| s.name().to_string()).collect(),
        })
    }
}

/// Run detection over `submissions` in a fresh context.
pub fn detect(
    submissions: Vec<Submission>,
    params: &DetectionParams,
    show_progress: bool,
) -> Result<DetectionReport, DetectError> {
    RunContext::new(submissions, params.clone())?.run(show_progress)
}
