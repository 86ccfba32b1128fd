//! Duplication tracker.
//!
//! The registry interns every distinct block text of the corpus together with
//! the submissions that own it and the distinct texts that are near-duplicates
//! of it. Each unordered pair of distinct texts is compared exactly once, when
//! the later of the two is first seen; the adjacency lists are the memo.
//!
//! Counts only grow. A block's raw count is the number of (owner, variant)
//! occurrences near-duplicate to it, itself included, so the final value does
//! not depend on the order submissions are observed in. Reporting filters
//! look only at occurrences owned by other submissions.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::distance::similar;
use crate::models::{BlockFinding, BlockMatch, DetectionParams};
use crate::output::truncate_text;
use crate::source::Submission;

#[derive(Debug)]
struct BlockEntry {
    text: String,
    line_count: usize,
    /// Owning submissions, in encounter order, each once.
    owners: Vec<String>,
    /// Indices of the other near-duplicate distinct texts.
    neighbors: Vec<usize>,
    raw_count: usize,
}

impl BlockEntry {
    fn similarity_count(&self) -> usize {
        self.raw_count.saturating_sub(1)
    }
}

/// Run-scoped registry of distinct blocks.
#[derive(Debug)]
pub struct BlockRegistry {
    tolerance: f64,
    entries: Vec<BlockEntry>,
    index: HashMap<String, usize>,
    observed: usize,
    comparisons: u64,
}

impl BlockRegistry {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            entries: Vec::new(),
            index: HashMap::new(),
            observed: 0,
            comparisons: 0,
        }
    }

    /// Number of distinct block texts seen so far.
    pub fn distinct_blocks(&self) -> usize {
        self.entries.len()
    }

    pub fn observed_submissions(&self) -> usize {
        self.observed
    }

    /// Distance comparisons performed so far.
    pub fn comparisons(&self) -> u64 {
        self.comparisons
    }

    /// Intern `text`, comparing it against every distinct text seen before.
    fn intern(&mut self, text: &str) -> usize {
        if let Some(&id) = self.index.get(text) {
            return id;
        }

        let id = self.entries.len();
        let mut neighbors = Vec::new();
        let mut raw_count = 0usize;
        for (other_id, other) in self.entries.iter_mut().enumerate() {
            self.comparisons += 1;
            if similar(text, &other.text, self.tolerance) {
                neighbors.push(other_id);
                other.neighbors.push(id);
                raw_count += other.owners.len();
            }
        }
        trace!(id, neighbors = neighbors.len(), "interned block");

        self.entries.push(BlockEntry {
            text: text.to_string(),
            line_count: text.lines().count(),
            owners: Vec::new(),
            neighbors,
            raw_count,
        });
        self.index.insert(text.to_string(), id);
        id
    }

    fn add_owner(&mut self, id: usize, owner: &str) {
        let entry = &mut self.entries[id];
        if entry.owners.last().map(String::as_str) == Some(owner) {
            return;
        }
        entry.owners.push(owner.to_string());
        entry.raw_count += 1;
        let neighbors = entry.neighbors.clone();
        for n in neighbors {
            self.entries[n].raw_count += 1;
        }
    }

    /// Record every block of `submission`, in file order.
    pub fn observe_submission(&mut self, submission: &Submission) {
        for block in submission.blocks() {
            let id = self.intern(block);
            self.add_owner(id, submission.name());
        }
        self.observed += 1;
        debug!(
            submission = submission.name(),
            blocks = submission.blocks().len(),
            distinct = self.entries.len(),
            "observed submission"
        );
    }

    /// Owners of an exact block text.
    pub fn owners(&self, text: &str) -> &[String] {
        self.index
            .get(text)
            .map_or(&[][..], |&id| self.entries[id].owners.as_slice())
    }

    /// Number of other near-duplicate occurrences of an exact block text,
    /// across the whole corpus and including repeats within one submission.
    pub fn similarity_count(&self, text: &str) -> Option<usize> {
        self.index
            .get(text)
            .map(|&id| self.entries[id].similarity_count())
    }

    /// Near-duplicate occurrences of entry `id` owned by submissions other
    /// than `owner`. Variants inside the owner's own code never count.
    fn foreign_count(&self, id: usize, owner: &str) -> usize {
        self.variants(id)
            .map(|v| self.entries[v].owners.iter().filter(|o| o.as_str() != owner).count())
            .sum()
    }

    /// The entry itself followed by its near-duplicates.
    fn variants(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(id).chain(self.entries[id].neighbors.iter().copied())
    }

    /// Whether block `id`, as owned by `owner`, passes the reporting filters.
    fn is_reportable(&self, id: usize, owner: &str, submission_count: usize, params: &DetectionParams) -> bool {
        let entry = &self.entries[id];
        if entry.line_count <= params.min_block_lines {
            return false;
        }
        let count = self.foreign_count(id, owner);
        count > params.min_similarity_count
            && (count as f64) < params.max_owner_ratio * submission_count as f64
    }

    /// Number of distinct blocks that pass the reporting filters for at
    /// least one of their owners.
    pub fn reportable_blocks(&self, submission_count: usize, params: &DetectionParams) -> usize {
        (0..self.entries.len())
            .filter(|&id| {
                self.entries[id]
                    .owners
                    .iter()
                    .any(|o| self.is_reportable(id, o, submission_count, params))
            })
            .count()
    }

    /// Reportable blocks owned by `submission`, in its block order.
    ///
    /// The reported similarity count only includes occurrences in other
    /// submissions, so a block repeated within one submission is never
    /// evidence on its own.
    pub fn findings_for(
        &self,
        submission: &Submission,
        submission_count: usize,
        params: &DetectionParams,
    ) -> Vec<BlockFinding> {
        let name = submission.name();
        let mut seen = HashSet::new();
        let mut findings = Vec::new();

        for block in submission.blocks() {
            let Some(&id) = self.index.get(block.as_str()) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            if !self.is_reportable(id, name, submission_count, params) {
                continue;
            }

            let mut matches = Vec::new();
            for variant in self.variants(id) {
                let other = &self.entries[variant];
                for owner in other.owners.iter().filter(|o| o.as_str() != name) {
                    matches.push(BlockMatch {
                        submission: owner.clone(),
                        excerpt: truncate_text(&other.text, params.excerpt_chars),
                        exact: variant == id,
                    });
                }
            }

            let entry = &self.entries[id];
            findings.push(BlockFinding {
                excerpt: truncate_text(&entry.text, params.excerpt_chars),
                similarity_count: matches.len(),
                line_count: entry.line_count,
                matches,
            });
        }
        findings
    }
}
