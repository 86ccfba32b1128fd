//! plagiarized-code command line.
//!
//! Loads a corpus of submissions, scores every pair, tracks duplicated
//! blocks and reports the pairs that are unusually similar.

use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use plagiarized_code::config::{load_params, ParamOverrides};
use plagiarized_code::detect::detect;
use plagiarized_code::distance::{distance, similar, submission_score, DEFAULT_TOLERANCE};
use plagiarized_code::loader::{load_submission, load_submissions};
use plagiarized_code::logging::init_tracing;
use plagiarized_code::models::Dimension;
use plagiarized_code::output::{
    print_block_findings, print_outliers, print_summary, write_json_file, write_matrix_csv_file,
    write_normalized_dump,
};

#[derive(Parser)]
#[command(name = "plagiarized-code")]
#[command(about = "Near-duplicate source code detection across submissions")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare every submission under a directory with every other one
    ///
    /// Each top-level entry of the input directory is one submission.
    /// Parameters default to DetectionParams::default(), then a config
    /// file, then the flags below.
    Check {
        /// Directory holding one entry per submission
        #[arg(short, long, default_value = ".")]
        input_path: PathBuf,

        /// TOML config file with a [detection] table
        #[arg(long)]
        config: Option<PathBuf>,

        /// Near-duplicate tolerance as a fraction of block length [default: 0.3]
        #[arg(long)]
        tolerance: Option<f64>,

        /// z-score above which a pair is flagged [default: 3.0]
        #[arg(long)]
        outlier_threshold: Option<f64>,

        /// Reported blocks span more lines than this [default: 2]
        #[arg(long)]
        min_block_lines: Option<usize>,

        /// Reported blocks have fewer variants than this share of submissions [default: 0.8]
        #[arg(long)]
        max_owner_ratio: Option<f64>,

        /// Reported blocks have more variants than this [default: 1]
        #[arg(long)]
        min_similarity_count: Option<usize>,

        /// Maximum characters of block excerpts [default: 120]
        #[arg(long)]
        excerpt_chars: Option<usize>,

        /// Worker threads for pair comparison [default: all cores]
        #[arg(long)]
        threads: Option<usize>,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the similarity matrix as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print up to N reportable blocks per submission
        #[arg(long)]
        show_blocks: Option<usize>,

        /// Maximum outliers printed per dimension
        #[arg(long, default_value = "20")]
        show_outliers: usize,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },

    /// Dump the raw text, normalized text and blocks of one submission
    Normalize {
        /// Submission directory or file
        #[arg(short, long, default_value = ".")]
        input_path: PathBuf,

        /// Also write log_blocks.txt
        #[arg(long)]
        blocks: bool,

        /// Directory for the log_*.txt files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Benchmark distance and submission scoring
    Benchmark {
        /// Number of iterations
        #[arg(long, default_value = "1000")]
        iterations: usize,

        /// Text size in characters
        #[arg(long, default_value = "300")]
        size: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check {
            input_path,
            config,
            tolerance,
            outlier_threshold,
            min_block_lines,
            max_owner_ratio,
            min_similarity_count,
            excerpt_chars,
            threads,
            json,
            csv,
            show_blocks,
            show_outliers,
            quiet,
        } => {
            let overrides = ParamOverrides {
                tolerance,
                outlier_threshold,
                min_block_lines,
                max_owner_ratio,
                min_similarity_count,
                excerpt_chars,
                threads,
            };
            let params = load_params(config.as_deref(), &overrides)?;

            info!(path = %input_path.display(), "starting analysis");
            let submissions = load_submissions(&input_path)?;
            let report = detect(submissions, &params, !quiet)?;

            if let Some(path) = json {
                write_json_file(&report, &path)?;
                info!(path = %path.display(), "wrote JSON report");
            }
            if let Some(path) = csv {
                write_matrix_csv_file(&report.matrix, &path)?;
                info!(path = %path.display(), "wrote matrix CSV");
            }

            print_summary(&report);
            for dimension in Dimension::ALL {
                print_outliers(report.outliers(dimension), Some(show_outliers));
            }
            if let Some(n) = show_blocks {
                print_block_findings(&report.block_findings, Some(n));
            }
        }

        Commands::Normalize {
            input_path,
            blocks,
            output_dir,
        } => {
            let submission = load_submission(&input_path)?;
            for path in write_normalized_dump(&submission, &output_dir, blocks)? {
                println!("Wrote {}", path.display());
            }
        }

        Commands::Benchmark { iterations, size } => {
            run_benchmark(iterations, size);
        }
    }

    Ok(())
}

/// Deterministic code-like text of roughly `size` chars.
fn synthetic_code(size: usize, salt: u32) -> String {
    let mut text = String::with_capacity(size + 40);
    let mut i = 0u32;
    while text.len() < size {
        text.push_str(&format!("v{i} = compute(v{}, {});\n", i.wrapping_add(salt), i * 7 + salt));
        i += 1;
    }
    text.truncate(size);
    text
}

fn report_timing(label: &str, iterations: usize, elapsed: std::time::Duration) {
    let per_call = elapsed.as_secs_f64() / iterations.max(1) as f64;
    println!("\n{label}:");
    println!("  Total time: {:.3}s", elapsed.as_secs_f64());
    println!("  Per call: {:.3}ms", per_call * 1000.0);
    if per_call > 0.0 {
        println!("  Calls/sec: {:.0}", 1.0 / per_call);
    }
}

/// Run scoring benchmark to measure performance.
fn run_benchmark(iterations: usize, size: usize) {
    println!("=== Similarity Benchmark ===");
    println!("Iterations: {}", iterations);
    println!("Text size: {}", size);

    let base = synthetic_code(size, 0);
    let edited: String = base
        .chars()
        .enumerate()
        .map(|(i, c)| if i % 10 == 9 { '#' } else { c })
        .collect();
    let unrelated = synthetic_code(size, 977);

    for (label, other) in [("Identical", &base), ("90% match", &edited), ("Unrelated", &unrelated)] {
        let start = Instant::now();
        for _ in 0..iterations {
            let _ = distance(&base, other);
        }
        report_timing(&format!("distance, {label}"), iterations, start.elapsed());

        let start = Instant::now();
        for _ in 0..iterations {
            let _ = similar(&base, other, DEFAULT_TOLERANCE);
        }
        report_timing(&format!("similar, {label}"), iterations, start.elapsed());

        let start = Instant::now();
        for _ in 0..iterations {
            let _ = submission_score(&base, other);
        }
        report_timing(&format!("submission_score, {label}"), iterations, start.elapsed());
    }
}
