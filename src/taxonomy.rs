use crate::error::{AbundanceError, Result};
use crate::rank::RankCode;
use crate::report::TaxonRecord;
use std::collections::HashMap;

/// Pseudo-taxon absorbing reads that do not map cleanly onto the target
/// rank: unclassified reads, direct assignments above the rank, and rollup
/// entries below the `min_reads` floor. Kraken2 already reserves taxon id 0
/// for its unclassified bucket, so the same id is reused here.
pub const OTHER_TAXON_ID: u64 = 0;
pub const OTHER_LABEL: &str = "other";

/// Rollup behavior knobs, one set per run.
#[derive(Debug, Clone, Default)]
pub struct RollupOptions {
    /// Require the exact rank code; sub-ranks like `G1` no longer fold into
    /// their base rank.
    pub exact_rank: bool,
    /// Entries below this read count are folded into the "other" bucket.
    pub min_reads: u64,
    /// Taxon names removed from the rollup and its total before
    /// normalization (host depletion after the fact).
    pub exclude: Vec<String>,
}

/// Per-sample read counts collapsed at one taxonomic rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankRollup {
    pub counts: HashMap<u64, u64>,
    pub names: HashMap<u64, String>,
    /// Sum of all rolled-up reads; the normalization denominator.
    pub total: u64,
}

/// The full taxonomy of one sample, as an arena of records indexed by taxon
/// id with child links built once. Built fresh per sample and discarded
/// after rollup; nothing is shared across samples.
#[derive(Debug)]
pub struct TaxonomyTree {
    records: Vec<TaxonRecord>,
    index: HashMap<u64, usize>,
    children: Vec<Vec<usize>>,
}

impl TaxonomyTree {
    /// Collects a record stream into an arena tree.
    ///
    /// Fails on the first parse error, on duplicate taxon ids, and with
    /// `EmptyInput` when the stream yields no records at all.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<TaxonRecord>>,
    {
        let mut arena: Vec<TaxonRecord> = Vec::new();
        let mut index: HashMap<u64, usize> = HashMap::new();

        for record in records {
            let record = record?;
            if index.contains_key(&record.taxon_id) {
                return Err(AbundanceError::malformed(
                    record.line,
                    format!("duplicate taxon id {}", record.taxon_id),
                ));
            }
            index.insert(record.taxon_id, arena.len());
            arena.push(record);
        }

        if arena.is_empty() {
            return Err(AbundanceError::EmptyInput {
                path: String::new(),
            });
        }

        let mut children = vec![Vec::new(); arena.len()];
        for (slot, record) in arena.iter().enumerate() {
            if let Some(parent_id) = record.parent_id {
                // The parser only emits parents it has already seen.
                let parent_slot = index[&parent_id];
                children[parent_slot].push(slot);
            }
        }

        Ok(TaxonomyTree {
            records: arena,
            index,
            children,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, taxon_id: u64) -> Option<&TaxonRecord> {
        self.index.get(&taxon_id).map(|&slot| &self.records[slot])
    }

    /// Sum of direct reads over the whole report, unclassified included.
    pub fn total_reads(&self) -> u64 {
        self.records.iter().map(|r| r.reads_direct).sum()
    }

    /// Checks the clade-count invariant on every node: clade reads must
    /// equal direct reads plus the clade reads of the immediate children,
    /// within `tolerance` (0 demands exact equality). Violations are
    /// collected and reported, never patched up.
    pub fn validate(&self, tolerance: f64) -> Result<()> {
        let mut offenders: Vec<u64> = Vec::new();
        for (slot, record) in self.records.iter().enumerate() {
            let child_clades: u64 = self.children[slot]
                .iter()
                .map(|&c| self.records[c].reads_clade)
                .sum();
            let expected = record.reads_direct + child_clades;
            let diff = record.reads_clade.abs_diff(expected);
            if diff as f64 > tolerance {
                offenders.push(record.taxon_id);
            }
        }
        if offenders.is_empty() {
            Ok(())
        } else {
            offenders.sort_unstable();
            Err(AbundanceError::InconsistentTree {
                path: String::new(),
                taxids: offenders,
            })
        }
    }

    /// Collapses the tree at `target`: every node's direct reads are
    /// assigned to its nearest ancestor-or-self at the target rank. A node
    /// below the rank with no exact match on its path falls back to the
    /// nearest coarser ancestor; direct reads above the rank and
    /// unclassified reads land in the "other" bucket. No reads are dropped,
    /// so the rollup total equals the report's direct-read total minus any
    /// excluded taxa.
    pub fn rollup(&self, target: RankCode, opts: &RollupOptions) -> RankRollup {
        let mut counts: HashMap<u64, u64> = HashMap::new();
        let mut names: HashMap<u64, String> = HashMap::new();
        let mut total: u64 = 0;

        for record in &self.records {
            if record.reads_direct == 0 {
                continue;
            }
            if opts.exclude.iter().any(|n| n == &record.name) {
                continue;
            }
            total += record.reads_direct;
            match self.rollup_slot(record, target, opts.exact_rank) {
                Some(slot) => {
                    let owner = &self.records[slot];
                    *counts.entry(owner.taxon_id).or_insert(0) += record.reads_direct;
                    names
                        .entry(owner.taxon_id)
                        .or_insert_with(|| owner.name.clone());
                }
                None => {
                    *counts.entry(OTHER_TAXON_ID).or_insert(0) += record.reads_direct;
                    names
                        .entry(OTHER_TAXON_ID)
                        .or_insert_with(|| OTHER_LABEL.to_string());
                }
            }
        }

        if opts.min_reads > 0 {
            let low: Vec<u64> = counts
                .iter()
                .filter(|&(&id, &count)| id != OTHER_TAXON_ID && count < opts.min_reads)
                .map(|(&id, _)| id)
                .collect();
            for id in low {
                let count = counts.remove(&id).unwrap_or(0);
                names.remove(&id);
                *counts.entry(OTHER_TAXON_ID).or_insert(0) += count;
                names
                    .entry(OTHER_TAXON_ID)
                    .or_insert_with(|| OTHER_LABEL.to_string());
            }
        }

        RankRollup {
            counts,
            names,
            total,
        }
    }

    /// Walks from `record` to the root and picks the arena slot that should
    /// absorb its direct reads, or `None` for the "other" bucket. A node at
    /// the target rank absorbs its own reads before its ancestors are
    /// considered.
    fn rollup_slot(&self, record: &TaxonRecord, target: RankCode, exact: bool) -> Option<usize> {
        let mut fallback: Option<usize> = None;
        let mut current = Some(self.index[&record.taxon_id]);

        while let Some(slot) = current {
            let node = &self.records[slot];
            if node.rank.matches(target, exact) {
                return Some(slot);
            }
            if fallback.is_none() && node.rank.coarser_than(target) {
                fallback = Some(slot);
            }
            current = node.parent_id.map(|id| self.index[&id]);
        }

        // The coarser fallback only applies to taxa sitting below the
        // target rank (e.g. a species-only path); above-rank and
        // unclassified reads stay in "other".
        if record.rank.finer_than(target) {
            fallback
        } else {
            None
        }
    }
}
