//! Record validation, flag-based prefiltering and read admission.
//!
//! The handler only depends on the [`AdmissionFilter`] contract: it is called
//! once per admitted record and decides on its own whether the read is kept
//! for per-read display. [`ReadCollector`] is the stock implementation.

use crate::alignment_record::{cigar_to_string, flags, AlignmentRecord, CigarOp, Strand};
use crate::cigar_walker::MismatchPosition;
use rustc_hash::FxHashMap;

/// Unmapped reads, reads without a CIGAR and empty alignments carry no coverage
pub fn is_record_usable(flags: u16, cigar: &[CigarOp], end: i64, start: i64) -> bool {
    flags & flags::UNMAPPED == 0 && !cigar.is_empty() && end > start
}

/// Optional exclusion of reads by SAM flag, applied before aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFlagFilter {
    pub duplicates: bool,
    pub secondary: bool,
    pub supplementary: bool,
    pub qc_fail: bool,
}

impl ReadFlagFilter {
    fn excluded_mask(&self) -> u16 {
        let mut mask = 0;
        if self.duplicates {
            mask |= flags::DUPLICATE;
        }
        if self.secondary {
            mask |= flags::SECONDARY;
        }
        if self.supplementary {
            mask |= flags::SUPPLEMENTARY;
        }
        if self.qc_fail {
            mask |= flags::QC_FAIL;
        }
        mask
    }

    pub fn passes(&self, flags: u16) -> bool {
        flags & self.excluded_mask() == 0
    }
}

/// Counts of the downsampling decision
pub trait DownsamplingSifter {
    fn retained(&self) -> usize;
    fn dropped(&self) -> usize;
}

/// Receives every record the handler admitted
pub trait AdmissionFilter {
    fn add(
        &mut self,
        record: &AlignmentRecord,
        start: i64,
        end: i64,
        mismatches: Option<Vec<MismatchPosition>>,
        head: Option<&[u8]>,
        tail: Option<&[u8]>,
    );

    fn sifter(&self) -> &dyn DownsamplingSifter;
}

/// Keeps at most `count` reads per `frame` bases of start position.
#[derive(Debug, Clone)]
pub struct FrameSifter {
    origin: i64,
    frame: i64,
    count: Option<usize>,
    per_frame: FxHashMap<i64, (usize, usize)>,
    retained: usize,
    dropped: usize,
}

impl FrameSifter {
    pub fn new(origin: i64, frame: i64, count: usize) -> Self {
        Self {
            origin,
            frame: frame.max(1),
            count: Some(count),
            per_frame: FxHashMap::default(),
            retained: 0,
            dropped: 0,
        }
    }

    /// Sifter that retains everything
    pub fn unbounded() -> Self {
        Self {
            origin: 0,
            frame: 1,
            count: None,
            per_frame: FxHashMap::default(),
            retained: 0,
            dropped: 0,
        }
    }

    pub fn admit(&mut self, start: i64) -> bool {
        let Some(count) = self.count else {
            self.retained += 1;
            return true;
        };
        let frame = (start - self.origin).div_euclid(self.frame);
        let (kept, lost) = self.per_frame.entry(frame).or_insert((0, 0));
        if *kept < count {
            *kept += 1;
            self.retained += 1;
            true
        } else {
            *lost += 1;
            self.dropped += 1;
            false
        }
    }

    /// `(frame_start, frame_end, dropped)` for every frame that lost reads, by position
    pub fn dropped_per_frame(&self) -> Vec<(i64, i64, usize)> {
        let mut frames: Vec<(i64, i64, usize)> = self
            .per_frame
            .iter()
            .filter(|(_, counts)| counts.1 > 0)
            .map(|(&frame, &(_, lost))| {
                let start = self.origin + frame * self.frame;
                (start, start + self.frame - 1, lost)
            })
            .collect();
        frames.sort_unstable();
        frames
    }
}

impl DownsamplingSifter for FrameSifter {
    fn retained(&self) -> usize {
        self.retained
    }

    fn dropped(&self) -> usize {
        self.dropped
    }
}

/// A read retained for per-read display
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRead {
    pub name: String,
    /// Start and end, extended over soft clips when clipping is shown
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
    pub cigar: String,
    pub flags: u16,
    pub mismatches: Option<Vec<MismatchPosition>>,
    pub head: Option<Vec<u8>>,
    pub tail: Option<Vec<u8>>,
}

/// Collects admitted reads, optionally downsampled.
#[derive(Debug)]
pub struct ReadCollector {
    sifter: FrameSifter,
    reads: Vec<AlignedRead>,
    keep_reads: bool,
}

impl ReadCollector {
    pub fn new(sifter: FrameSifter) -> Self {
        Self {
            sifter,
            reads: Vec::new(),
            keep_reads: true,
        }
    }

    /// Only run the sifter; reads are counted but not stored
    pub fn coverage_only() -> Self {
        Self {
            sifter: FrameSifter::unbounded(),
            reads: Vec::new(),
            keep_reads: false,
        }
    }

    pub fn reads(&self) -> &[AlignedRead] {
        &self.reads
    }

    pub fn frame_sifter(&self) -> &FrameSifter {
        &self.sifter
    }

    pub fn into_reads(self) -> Vec<AlignedRead> {
        self.reads
    }
}

impl AdmissionFilter for ReadCollector {
    fn add(
        &mut self,
        record: &AlignmentRecord,
        start: i64,
        end: i64,
        mismatches: Option<Vec<MismatchPosition>>,
        head: Option<&[u8]>,
        tail: Option<&[u8]>,
    ) {
        if !self.sifter.admit(start) || !self.keep_reads {
            return;
        }
        self.reads.push(AlignedRead {
            name: record.name.clone(),
            start,
            end,
            strand: record.strand,
            cigar: cigar_to_string(&record.cigar),
            flags: record.flags,
            mismatches,
            head: head.map(<[u8]>::to_vec),
            tail: tail.map(<[u8]>::to_vec),
        });
    }

    fn sifter(&self) -> &dyn DownsamplingSifter {
        &self.sifter
    }
}
