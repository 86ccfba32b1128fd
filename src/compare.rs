//! Pairwise comparison scheduling.
//!
//! Every unordered submission pair is an independent unit of work: a pure
//! function of two immutable submissions. Units run on the rayon pool and
//! their results are reduced into a [`SimilarityMatrix`] once all of them
//! have finished, so completion order never matters.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::distance::submission_score;
use crate::models::{DetectionParams, PairScore, SimilarityMatrix, SkippedPair};
use crate::source::Submission;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Reduced result of the pair stage.
#[derive(Debug, Default)]
pub struct ComparisonOutcome {
    pub matrix: SimilarityMatrix,
    /// Pairs whose unit failed; they are absent from the matrix.
    pub skipped: Vec<SkippedPair>,
}

/// All `n * (n - 1) / 2` unordered index pairs, `i < j`.
pub fn all_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect()
}

/// Score one pair on raw and normalized text.
pub fn compare_pair(a: &Submission, b: &Submission) -> PairScore {
    PairScore {
        raw: submission_score(a.text(), b.text()),
        normalized: submission_score(a.normalized_text(), b.normalized_text()),
    }
}

/// Load, normalize and split every submission in parallel.
pub fn warm_submissions(submissions: &[Submission]) {
    submissions.par_iter().for_each(Submission::warm);
}

fn progress_bar(len: usize, show_progress: bool) -> Option<ProgressBar> {
    if !show_progress {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pairs ({per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    Some(pb)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "comparison panicked".to_string()
    }
}

/// Run `unit` over every pair and reduce the results.
fn run_units<F>(submissions: &[Submission], show_progress: bool, unit: F) -> ComparisonOutcome
where
    F: Fn(&Submission, &Submission) -> PairScore + Sync,
{
    let pairs = all_pairs(submissions.len());
    info!(
        submissions = submissions.len(),
        pairs = pairs.len(),
        threads = rayon::current_num_threads(),
        "comparing submission pairs"
    );
    let progress = progress_bar(pairs.len(), show_progress);

    let results: Vec<(usize, usize, Result<PairScore, String>)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let (a, b) = (&submissions[i], &submissions[j]);
            let result = catch_unwind(AssertUnwindSafe(|| unit(a, b)))
                .map_err(|payload| panic_message(payload.as_ref()));

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
            (i, j, result)
        })
        .collect();

    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }

    let mut outcome = ComparisonOutcome::default();
    for (i, j, result) in results {
        let (a, b) = (submissions[i].name(), submissions[j].name());
        match result {
            Ok(score) => {
                debug!(a, b, raw = score.raw, normalized = score.normalized, "pair scored");
                outcome.matrix.insert(a, b, score);
            }
            Err(reason) => {
                warn!(a, b, %reason, "comparison failed, pair skipped");
                outcome.skipped.push(SkippedPair {
                    a: a.to_string(),
                    b: b.to_string(),
                    reason,
                });
            }
        }
    }
    outcome
}

/// Compute the similarity matrix over all unordered pairs of `submissions`.
///
/// With `params.threads` set, the pair stage runs in a dedicated pool of
/// that size; otherwise the global pool sized to the available cores is used.
pub fn compare_submissions(
    submissions: &[Submission],
    params: &DetectionParams,
    show_progress: bool,
) -> Result<ComparisonOutcome, CompareError> {
    match params.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
            Ok(pool.install(|| run_units(submissions, show_progress, compare_pair)))
        }
        None => Ok(run_units(submissions, show_progress, compare_pair)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dimension;
    use crate::normalize::Language;
    use crate::source::SourceFile;

    fn submission(name: &str, code: &str) -> Submission {
        Submission::new(
            name,
            vec![SourceFile::from_text("main.py", Language::PythonLike, code)],
        )
    }

    fn corpus() -> Vec<Submission> {
        vec![
            submission("a", "def f(x):\n    return x * 2\n"),
            submission("b", "def f(x):\n  return x*2  # double\n"),
            submission("c", "print('hello world, this is unrelated')\n"),
            submission("d", "for i in range(10):\n    total += i\n"),
        ]
    }

    #[test]
    fn test_all_pairs() {
        assert!(all_pairs(0).is_empty());
        assert!(all_pairs(1).is_empty());
        assert_eq!(all_pairs(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(all_pairs(20).len(), 190);
    }

    #[test]
    fn test_matrix_is_complete_and_symmetric() {
        let subs = corpus();
        let outcome = compare_submissions(&subs, &DetectionParams::default(), false).unwrap();
        assert_eq!(outcome.matrix.len(), 6);
        assert!(outcome.skipped.is_empty());
        for a in &subs {
            assert_eq!(outcome.matrix.get(a.name(), a.name()), None);
            for b in &subs {
                if a.name() != b.name() {
                    assert_eq!(
                        outcome.matrix.get(a.name(), b.name()),
                        outcome.matrix.get(b.name(), a.name())
                    );
                }
            }
        }
    }

    #[test]
    fn test_reformatted_copy_scores_zero_when_normalized() {
        let subs = corpus();
        let outcome = compare_submissions(&subs, &DetectionParams::default(), false).unwrap();
        let score = outcome.matrix.get("a", "b").unwrap();
        assert_eq!(score.get(Dimension::Normalized), 0);
        assert!(score.get(Dimension::Raw) > 0);
    }

    #[test]
    fn test_dedicated_pool_gives_same_matrix() {
        let subs = corpus();
        let global = compare_submissions(&subs, &DetectionParams::default(), false).unwrap();
        let params = DetectionParams {
            threads: Some(2),
            ..Default::default()
        };
        let pooled = compare_submissions(&subs, &params, false).unwrap();
        assert_eq!(global.matrix.entries(), pooled.matrix.entries());
    }

    #[test]
    fn test_panicking_unit_is_skipped() {
        let subs = corpus();
        let outcome = run_units(&subs, false, |a, b| {
            if a.name() == "a" && b.name() == "c" {
                panic!("boom");
            }
            compare_pair(a, b)
        });
        assert_eq!(outcome.matrix.len(), 5);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].a, "a");
        assert_eq!(outcome.skipped[0].b, "c");
        assert_eq!(outcome.skipped[0].reason, "boom");
        assert!(outcome.matrix.get("a", "c").is_none());
    }
}
