//! Similarity engine.
//!
//! Block-level similarity uses an edit distance with a length-relative
//! tolerance. Submission-level similarity is a coarser sliding-alignment
//! score, only meaningful for ranking pairs against each other.
//!
//! This is the HOT PATH of both the tracker and the scheduler.

/// Default tolerance fraction of the normalized length.
pub const DEFAULT_TOLERANCE: f64 = 0.3;

/// Shortest run of equal bytes that counts toward a sliding alignment.
pub const MIN_RUN: usize = 8;

/// Upper bound of [`submission_score`]: nothing in common.
pub const MAX_SCORE: u32 = 1000;

/// Optimal-string-alignment edit distance over chars.
///
/// Counts insertions, deletions, substitutions and transpositions of two
/// adjacent chars. Symmetric, and zero only for equal strings.
pub fn distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = a.len();
    let m = b.len();

    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    // Three rolling rows: i-2, i-1 and i.
    let mut before: Vec<usize> = vec![0; m + 1];
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut cur: Vec<usize> = vec![0; m + 1];

    for i in 1..=n {
        cur[0] = i;
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(before[j - 2] + 1);
            }
            cur[j] = best;
        }
        std::mem::swap(&mut before, &mut prev);
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[m]
}

/// Char length after collapsing whitespace runs to one space and trimming.
pub fn normalized_len(s: &str) -> usize {
    let mut words = 0usize;
    let mut chars = 0usize;
    for word in s.split_whitespace() {
        words += 1;
        chars += word.chars().count();
    }
    chars + words.saturating_sub(1)
}

/// Largest distance (exclusive) at which `a` and `b` are near-duplicates.
pub fn tolerance(a: &str, b: &str, k: f64) -> f64 {
    normalized_len(a).max(normalized_len(b)) as f64 * k
}

/// Whether two blocks are near-duplicates under tolerance fraction `k`.
pub fn similar(a: &str, b: &str, k: f64) -> bool {
    if a == b {
        return true;
    }
    let limit = tolerance(a, b, k);
    // The distance is at least the length difference.
    let len_gap = a.chars().count().abs_diff(b.chars().count());
    if len_gap as f64 >= limit {
        return false;
    }
    (distance(a, b) as f64) < limit
}

/// Bytes covered by runs of at least `min_run` equal bytes when `short[i]`
/// sits over `long[i + offset]`.
#[inline]
fn alignment_score(short: &[u8], long: &[u8], offset: isize, min_run: usize) -> usize {
    let start = offset.min(0).unsigned_abs();
    let end = short.len().min((long.len() as isize - offset) as usize);

    let mut total = 0usize;
    let mut run = 0usize;
    for i in start..end {
        let j = (i as isize + offset) as usize;
        if short[i] == long[j] {
            run += 1;
        } else {
            if run >= min_run {
                total += run;
            }
            run = 0;
        }
    }
    if run >= min_run {
        total += run;
    }
    total
}

/// Per-mille dissimilarity of two whole texts.
///
/// The shorter text slides across the longer one at every offset, partial
/// overlaps included. The best alignment's coverage `s` of the longer text
/// gives `1000 * (len_long - s) / len_long`: 0 for identical texts,
/// [`MAX_SCORE`] when no run lines up.
pub fn submission_score(a: &str, b: &str) -> u32 {
    let (short, long) = if a.len() <= b.len() {
        (a.as_bytes(), b.as_bytes())
    } else {
        (b.as_bytes(), a.as_bytes())
    };
    if long.is_empty() {
        return 0;
    }
    if short.is_empty() {
        return MAX_SCORE;
    }

    let min_run = MIN_RUN.min(short.len());
    let first = -(short.len() as isize - 1);
    let last = long.len() as isize - 1;

    let mut best = 0usize;
    for offset in first..=last {
        best = best.max(alignment_score(short, long, offset, min_run));
        if best == short.len() {
            break;
        }
    }

    let uncovered = (long.len() - best) as u64;
    (uncovered * MAX_SCORE as u64 / long.len() as u64) as u32
}
