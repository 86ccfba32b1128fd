//! Criterion benchmarks for block distance, submission scoring and normalization.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plagiarized_code::cfamily;
use plagiarized_code::distance::{distance, similar, submission_score, DEFAULT_TOLERANCE};
use plagiarized_code::models::DetectionParams;
use plagiarized_code::normalize::Language;
use plagiarized_code::python;
use plagiarized_code::source::{SourceFile, Submission};
use plagiarized_code::tracker::BlockRegistry;

/// Code-like text of `size` chars.
fn code(size: usize, salt: u32) -> String {
    let mut text = String::with_capacity(size + 40);
    let mut i = 0u32;
    while text.len() < size {
        text.push_str(&format!("v{i} = f(v{}, {});\n", i.wrapping_add(salt), i * 3 + salt));
        i += 1;
    }
    text.truncate(size);
    text
}

fn edited(text: &str, every: usize) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| if i % every == every - 1 { '#' } else { c })
        .collect()
}

fn bench_distance(c: &mut Criterion) {
    let sizes = [50, 200, 800];

    let mut group = c.benchmark_group("distance");

    for size in sizes {
        let base = code(size, 0);

        // Identical blocks short-circuit
        group.bench_with_input(BenchmarkId::new("identical", size), &size, |b, _| {
            b.iter(|| distance(black_box(&base), black_box(&base)))
        });

        // 90% match (typical near-duplicate)
        let near = edited(&base, 10);
        group.bench_with_input(BenchmarkId::new("90pct_match", size), &size, |b, _| {
            b.iter(|| distance(black_box(&base), black_box(&near)))
        });

        // Unrelated blocks of equal length (full DP fill)
        let other = code(size, 977);
        group.bench_with_input(BenchmarkId::new("unrelated", size), &size, |b, _| {
            b.iter(|| distance(black_box(&base), black_box(&other)))
        });

        // Length gap rejects before any DP
        let short = code(size / 3, 977);
        group.bench_with_input(BenchmarkId::new("similar_len_gap", size), &size, |b, _| {
            b.iter(|| similar(black_box(&base), black_box(&short), DEFAULT_TOLERANCE))
        });
    }

    group.finish();
}

fn bench_submission_score(c: &mut Criterion) {
    let sizes = [1_000, 5_000, 20_000];

    let mut group = c.benchmark_group("submission_score");
    group.sample_size(20);

    for size in sizes {
        let base = code(size, 0);
        let near = edited(&base, 40);
        let other = code(size, 977);

        group.bench_with_input(BenchmarkId::new("near_copy", size), &size, |b, _| {
            b.iter(|| submission_score(black_box(&base), black_box(&near)))
        });

        group.bench_with_input(BenchmarkId::new("unrelated", size), &size, |b, _| {
            b.iter(|| submission_score(black_box(&base), black_box(&other)))
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let c_source = "int f(int x){\n  if (x>0) { return x*2; }\n  /* neg */ return -x;\n}\n".repeat(200);
    let py_source = "def f(x):\n  if x>0:\n    return x*2\n  # neg\n  return -x\n".repeat(200);

    let mut group = c.benchmark_group("normalize");

    group.bench_function("c_family", |b| b.iter(|| cfamily::normalize(black_box(&c_source))));
    group.bench_function("python", |b| b.iter(|| python::normalize(black_box(&py_source))));

    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let params = DetectionParams::default();

    let mut group = c.benchmark_group("block_registry");
    group.sample_size(10);

    for count in [10, 40] {
        let submissions: Vec<Submission> = (0..count)
            .map(|i| {
                let text = (0..20)
                    .map(|j| format!("int f{j}(int a) {{\n    return a * {} + {j};\n}}\n", (i * 31 + j) % 97))
                    .collect::<String>();
                Submission::new(
                    format!("s{i}"),
                    vec![SourceFile::from_text("main.c", Language::CFamily, &text)],
                )
            })
            .collect();
        for submission in &submissions {
            submission.warm();
        }

        group.bench_with_input(BenchmarkId::new("observe", count), &count, |b, _| {
            b.iter(|| {
                let mut registry = BlockRegistry::new(params.tolerance);
                for submission in &submissions {
                    registry.observe_submission(submission);
                }
                registry.distinct_blocks()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_distance,
    bench_submission_score,
    bench_normalize,
    bench_registry
);
criterion_main!(benches);
