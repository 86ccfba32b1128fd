//! Statistical outlier scoring over the similarity matrix.
//!
//! Scores are dissimilarities, so a pair is suspicious when it sits far
//! *below* the corpus median: `z = (median - score) / stdev`.

use tracing::debug;

use crate::models::{Dimension, OutlierFinding, OutlierReport, SimilarityMatrix};

/// Standard deviations at or below this are treated as zero variance.
const MIN_STDEV: f64 = 1e-9;

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Population standard deviation.
pub fn stdev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// Rank the pairs of one dimension whose z-score exceeds `threshold`.
///
/// Fewer than two pairs or zero variance yield an empty report.
pub fn score_outliers(matrix: &SimilarityMatrix, dimension: Dimension, threshold: f64) -> OutlierReport {
    let values: Vec<f64> = matrix.values(dimension).into_iter().map(f64::from).collect();
    if values.len() < 2 {
        debug!(%dimension, pairs = values.len(), "too few pairs for outlier scoring");
        return OutlierReport::empty(dimension, threshold);
    }

    let (Some(median), Some(stdev)) = (median(&values), stdev(&values)) else {
        return OutlierReport::empty(dimension, threshold);
    };
    if stdev <= MIN_STDEV {
        debug!(%dimension, median, "zero variance, no outliers");
        return OutlierReport {
            median,
            ..OutlierReport::empty(dimension, threshold)
        };
    }

    let mut findings: Vec<OutlierFinding> = matrix
        .pairs()
        .filter_map(|(a, b, score)| {
            let value = score.get(dimension);
            let z_score = (median - f64::from(value)) / stdev;
            (z_score > threshold).then(|| OutlierFinding {
                a: a.to_string(),
                b: b.to_string(),
                score: value,
                z_score,
            })
        })
        .collect();

    findings.sort_by(|x, y| {
        y.z_score
            .total_cmp(&x.z_score)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });

    debug!(%dimension, median, stdev, flagged = findings.len(), "scored outliers");
    OutlierReport {
        dimension,
        median,
        stdev,
        threshold,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PairScore;

    fn matrix(scores: &[(&str, &str, u32)]) -> SimilarityMatrix {
        let mut m = SimilarityMatrix::new();
        for &(a, b, s) in scores {
            m.insert(a, b, PairScore { raw: s, normalized: s });
        }
        m
    }

    #[test]
    fn test_median_and_stdev() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
    }

    #[test]
    fn test_flags_unusually_similar_pair() {
        let mut scores = Vec::new();
        let names = ["a", "b", "c", "d", "e", "f"];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                let value = if (*a, *b) == ("b", "e") { 100 } else { 950 + (i as u32 % 3) * 10 };
                scores.push((*a, *b, value));
            }
        }
        let report = score_outliers(&matrix(&scores), Dimension::Normalized, 3.0);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].a, "b");
        assert_eq!(report.findings[0].b, "e");
        assert!(report.findings[0].z_score > 3.0);
    }

    #[test]
    fn test_findings_sorted_by_z() {
        let m = matrix(&[
            ("a", "b", 500),
            ("a", "c", 1000),
            ("a", "d", 1000),
            ("b", "c", 1000),
            ("b", "d", 1000),
            ("c", "d", 100),
        ]);
        let report = score_outliers(&m, Dimension::Raw, 0.5);
        let pairs: Vec<(&str, &str)> = report
            .findings
            .iter()
            .map(|f| (f.a.as_str(), f.b.as_str()))
            .collect();
        assert_eq!(pairs, vec![("c", "d"), ("a", "b")]);
    }

    #[test]
    fn test_zero_variance_flags_nothing() {
        let m = matrix(&[("a", "b", 700), ("a", "c", 700), ("b", "c", 700)]);
        let report = score_outliers(&m, Dimension::Raw, 0.0);
        assert!(report.findings.is_empty());
        assert_eq!(report.median, 700.0);
    }

    #[test]
    fn test_degenerate_corpus_flags_nothing() {
        let empty = SimilarityMatrix::new();
        assert!(score_outliers(&empty, Dimension::Raw, 3.0).findings.is_empty());
        let single = matrix(&[("a", "b", 10)]);
        assert!(score_outliers(&single, Dimension::Raw, 3.0).findings.is_empty());
    }
}
