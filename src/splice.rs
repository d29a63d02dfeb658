use crate::alignment_record::Strand;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct JunctionKey {
    start: i64,
    end: i64,
    strand: Strand,
}

/// An intron skipped by one or more reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceJunction {
    /// Last exonic base before the intron
    pub start: i64,
    /// Last intronic base
    pub end: i64,
    pub strand: Strand,
    pub count: u32,
}

/// Occurrence counts of splice junctions, keyed by (start, end, strand)
#[derive(Debug, Default)]
pub struct SpliceJunctionTable {
    counts: FxHashMap<JunctionKey, u32>,
}

impl SpliceJunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, start: i64, end: i64, strand: Strand) {
        *self
            .counts
            .entry(JunctionKey { start, end, strand })
            .or_insert(0) += 1;
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// All junctions, in no particular order
    pub fn junctions(&self) -> Vec<SpliceJunction> {
        self.counts
            .iter()
            .map(|(key, &count)| SpliceJunction {
                start: key.start,
                end: key.end,
                strand: key.strand,
                count,
            })
            .collect()
    }
}
