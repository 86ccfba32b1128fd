//! Output formatting for detection reports (JSON, CSV, terminal).

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{
    DetectionReport, MatrixEntry, OutlierFinding, OutlierReport, SubmissionFindings,
};
use crate::source::Submission;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write the full report as JSON.
pub fn write_json<W: Write>(report: &DetectionReport, writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(report)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write the full report as JSON to a file.
pub fn write_json_file(report: &DetectionReport, path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_json(report, &mut file)
}

/// Quote a CSV field when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write the similarity matrix as CSV, one row per unordered pair.
pub fn write_matrix_csv<W: Write>(entries: &[MatrixEntry], writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "a,b,raw,normalized")?;
    for entry in entries {
        writeln!(
            writer,
            "{},{},{},{}",
            csv_field(&entry.a),
            csv_field(&entry.b),
            entry.raw,
            entry.normalized
        )?;
    }
    Ok(())
}

/// Write the similarity matrix as CSV to a file.
pub fn write_matrix_csv_file(entries: &[MatrixEntry], path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_matrix_csv(entries, &mut file)
}

/// Write a summary report to stdout.
pub fn print_summary(report: &DetectionReport) {
    let s = &report.summary;
    println!("\n=== Detection Summary ===");
    println!("Version: {}", report.version);
    println!();
    println!("Parameters:");
    println!("  Tolerance: {}", report.parameters.tolerance);
    println!("  Outlier threshold: {}", report.parameters.outlier_threshold);
    println!("  Min block lines: {}", report.parameters.min_block_lines);
    println!("  Max owner ratio: {:.0}%", report.parameters.max_owner_ratio * 100.0);
    println!();
    println!("Corpus:");
    println!("  Submissions compared: {}", s.submission_count);
    println!("  Submissions excluded: {}", s.excluded_submissions);
    println!("  Files excluded: {}", s.excluded_files);
    println!("  Distinct blocks: {}", s.distinct_blocks);
    println!();
    println!("Results:");
    println!("  Pairs scored: {}", s.pair_count);
    if s.skipped_pairs > 0 {
        println!("  Pairs skipped: {}", s.skipped_pairs);
        for pair in &report.skipped {
            println!("    {} <-> {}: {}", pair.a, pair.b, pair.reason);
        }
    }
    println!("  Raw outliers: {}", s.raw_outliers);
    println!("  Normalized outliers: {}", s.normalized_outliers);
    println!("  Reportable blocks: {}", s.reportable_blocks);
}

/// Format an outlier as a one-line string.
pub fn format_finding(finding: &OutlierFinding) -> String {
    format!(
        "{} <-> {}: score={} z={:.2}",
        finding.a, finding.b, finding.score, finding.z_score
    )
}

/// Print the ranked outliers of one dimension.
pub fn print_outliers(report: &OutlierReport, limit: Option<usize>) {
    println!(
        "\n=== {} outliers (median {:.1}, stdev {:.1}, z > {}) ===",
        report.dimension, report.median, report.stdev, report.threshold
    );
    if report.findings.is_empty() {
        println!("  none");
        return;
    }

    let to_print = match limit {
        Some(n) => &report.findings[..n.min(report.findings.len())],
        None => &report.findings[..],
    };
    for finding in to_print {
        println!("  {}", format_finding(finding));
    }

    if let Some(n) = limit {
        if report.findings.len() > n {
            println!("  ... and {} more", report.findings.len() - n);
        }
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print reportable blocks, at most `limit` per submission.
pub fn print_block_findings(findings: &[SubmissionFindings], limit: Option<usize>) {
    for entry in findings {
        println!("\n=== {} ===", entry.submission);
        let shown = limit.unwrap_or(entry.blocks.len()).min(entry.blocks.len());
        for block in &entry.blocks[..shown] {
            println!(
                "  {} variant(s), {} lines:",
                block.similarity_count, block.line_count
            );
            println!("{}", indent(&block.excerpt, "    | "));
            for m in &block.matches {
                let kind = if m.exact { "exact" } else { "near" };
                println!("    - {} ({kind})", m.submission);
            }
        }
        if entry.blocks.len() > shown {
            println!("  ... and {} more blocks", entry.blocks.len() - shown);
        }
    }
}

/// Truncate text to `max_len` chars, marking the cut with `...`.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Dump one submission's texts for inspection.
///
/// Writes `log_text.txt` and `log_normalized_text.txt`, plus `log_blocks.txt`
/// when `with_blocks` is set. Returns the written paths.
pub fn write_normalized_dump(
    submission: &Submission,
    dir: &Path,
    with_blocks: bool,
) -> Result<Vec<PathBuf>, OutputError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let text_path = dir.join("log_text.txt");
    std::fs::write(&text_path, submission.text())?;
    written.push(text_path);

    let normalized_path = dir.join("log_normalized_text.txt");
    std::fs::write(&normalized_path, submission.normalized_text())?;
    written.push(normalized_path);

    if with_blocks {
        let blocks_path = dir.join("log_blocks.txt");
        let mut file = std::fs::File::create(&blocks_path)?;
        for (i, block) in submission.blocks().iter().enumerate() {
            writeln!(file, "--- block {} ---", i + 1)?;
            writeln!(file, "{block}")?;
        }
        written.push(blocks_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Language;
    use crate::source::SourceFile;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_text("this is too long", 10), "this is...");
        assert_eq!(truncate_text("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_text("abcdef", 2), "...");
    }

    #[test]
    fn test_matrix_csv() {
        let entries = vec![
            MatrixEntry { a: "alice".into(), b: "bob".into(), raw: 900, normalized: 850 },
            MatrixEntry { a: "o'neil, j".into(), b: "say \"hi\"".into(), raw: 1, normalized: 0 },
        ];
        let mut out = Vec::new();
        write_matrix_csv(&entries, &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert_eq!(
            csv,
            "a,b,raw,normalized\nalice,bob,900,850\n\"o'neil, j\",\"say \"\"hi\"\"\",1,0\n"
        );
    }

    #[test]
    fn test_format_finding() {
        let finding = OutlierFinding {
            a: "alice".into(),
            b: "bob".into(),
            score: 120,
            z_score: 4.567,
        };
        assert_eq!(format_finding(&finding), "alice <-> bob: score=120 z=4.57");
    }

    #[test]
    fn test_normalized_dump() {
        let dir = tempfile::tempdir().unwrap();
        let sub = Submission::new(
            "alice",
            vec![SourceFile::from_text("a.c", Language::CFamily, "int a;  // one\nint b;")],
        );
        let written = write_normalized_dump(&sub, dir.path(), true).unwrap();
        assert_eq!(written.len(), 3);
        let normalized = std::fs::read_to_string(dir.path().join("log_normalized_text.txt")).unwrap();
        assert_eq!(normalized, "int a;\nint b;");
        let blocks = std::fs::read_to_string(dir.path().join("log_blocks.txt")).unwrap();
        assert!(blocks.contains("--- block 2 ---\nint b;"));
    }
}
