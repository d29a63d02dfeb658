use crate::alignment_record::{AlignmentRecord, Strand};
use crate::cigar_walker::{AlignmentSink, CigarWalker, MismatchPosition};
use crate::coverage::{BaseCoverage, CoverageAccumulator, DeltaTrack};
use crate::errors::{Result, TrackError};
use crate::filter::{is_record_usable, AdmissionFilter, DownsamplingSifter};
use crate::options::QueryOptions;
use crate::reference_buffer::ReferenceWindowBuffer;
use crate::sequence_index::ReferenceProvider;
use crate::splice::{SpliceJunction, SpliceJunctionTable};
use crate::window::GenomicWindow;
use log::debug;

/// What happened to a record passed to [`Handler::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Aggregated and forwarded to the admission filter
    Admitted,
    /// Rejected by the record validator (unmapped, no CIGAR, empty span)
    Unusable,
    /// Dropped because of a malformed CIGAR; counted in `skipped_records`
    Skipped,
}

/// Routes walker events into the coverage arrays and the junction table
struct TrackSink<'h> {
    coverage: &'h mut CoverageAccumulator,
    junctions: &'h mut SpliceJunctionTable,
    show_splice_junction: bool,
}

impl AlignmentSink for TrackSink<'_> {
    fn mismatch_base(&mut self, pos: i64, base: u8) {
        self.coverage.add_base(pos, base);
    }

    fn insertion(&mut self, pos: i64) {
        self.coverage.add_insertion(pos);
    }

    fn deletion(&mut self, start: i64, end: i64) {
        self.coverage.add_interval(start, end, DeltaTrack::Deletion, true);
    }

    fn intron(&mut self, start: i64, end: i64, strand: Strand) {
        if self.show_splice_junction {
            self.junctions.record(start - 1, end, strand);
        }
        // Skipped bases are not covered by the read
        self.coverage.add_interval(start, end, DeltaTrack::Total, false);
    }
}

/// Aggregates the alignment records of one track window.
///
/// One handler serves one request: records are fed through [`Handler::add`]
/// in any order, then coverage and splice junctions are read out once. A
/// failure to fetch reference bases poisons the handler, since the reference
/// buffer can no longer be trusted.
pub struct Handler<'a, F: AdmissionFilter> {
    window: GenomicWindow,
    options: QueryOptions,
    filter: F,
    coverage: CoverageAccumulator,
    junctions: SpliceJunctionTable,
    reference: Option<ReferenceWindowBuffer<'a>>,
    records_seen: usize,
    skipped: usize,
    poisoned: bool,
}

impl<'a, F: AdmissionFilter> Handler<'a, F> {
    /// In FULL mode the reference buffer is fetched right away and covers the
    /// window plus one step to the right.
    pub fn new(
        window: GenomicWindow,
        reference: Option<&'a dyn ReferenceProvider>,
        filter: F,
        options: QueryOptions,
    ) -> Result<Self> {
        if options.reference_step <= 0 {
            return Err(TrackError::InvalidReferenceStep(options.reference_step));
        }
        let reference = if options.is_full() {
            let provider = reference.ok_or(TrackError::MissingReference)?;
            Some(ReferenceWindowBuffer::new(
                provider,
                &options.chromosome,
                options.reference_id,
                options.reference_step,
                window.start(),
                window.end() + options.reference_step,
            )?)
        } else {
            None
        };

        Ok(Self {
            window,
            options,
            filter,
            coverage: CoverageAccumulator::new(window),
            junctions: SpliceJunctionTable::new(),
            reference,
            records_seen: 0,
            skipped: 0,
            poisoned: false,
        })
    }

    pub fn add(&mut self, record: &AlignmentRecord) -> Result<AddOutcome> {
        if self.poisoned {
            return Err(TrackError::Poisoned);
        }
        self.records_seen += 1;

        if !is_record_usable(record.flags, &record.cigar, record.end, record.start) {
            return Ok(AddOutcome::Unusable);
        }
        if let Err(e) = record.check_cigar() {
            debug!("Skipping record: {e}");
            self.skipped += 1;
            return Ok(AddOutcome::Skipped);
        }

        self.coverage
            .add_interval(record.start, record.end, DeltaTrack::Total, true);

        let (start, end, head, tail) = self.clipped_extent(record);
        if let Err(e) = self.grow_reference(start, end) {
            self.poisoned = true;
            return Err(e);
        }

        let buffer_start = self.min_position();
        let walker = CigarWalker::new(
            &record.read,
            self.reference.as_ref().map(ReferenceWindowBuffer::as_bytes),
            start,
            buffer_start,
            self.options.show_clipping,
            record.splice_strand(),
        );
        let mut sink = TrackSink {
            coverage: &mut self.coverage,
            junctions: &mut self.junctions,
            show_splice_junction: self.options.show_splice_junction,
        };
        let mismatches = walker.walk(&record.cigar, &mut sink);

        let mismatches = self.options.is_full().then_some(mismatches);
        self.filter.add(record, start, end, mismatches, head, tail);
        Ok(AddOutcome::Admitted)
    }

    /// Mismatches of a single record against the reference, without touching
    /// the aggregated coverage. Requires FULL mode.
    pub fn mismatches_for(&mut self, record: &AlignmentRecord) -> Result<Vec<MismatchPosition>> {
        if self.poisoned {
            return Err(TrackError::Poisoned);
        }
        if self.reference.is_none() {
            return Err(TrackError::MissingReference);
        }
        record.check_cigar()?;

        let (start, end, _, _) = self.clipped_extent(record);
        if let Err(e) = self.grow_reference(start, end) {
            self.poisoned = true;
            return Err(e);
        }

        let walker = CigarWalker::new(
            &record.read,
            self.reference.as_ref().map(ReferenceWindowBuffer::as_bytes),
            start,
            self.min_position(),
            self.options.show_clipping,
            record.splice_strand(),
        );
        Ok(walker.walk(&record.cigar, &mut ()))
    }

    /// Start and end as displayed, plus the clipped head and tail bases when
    /// clipping is shown
    fn clipped_extent<'r>(
        &self,
        record: &'r AlignmentRecord,
    ) -> (i64, i64, Option<&'r [u8]>, Option<&'r [u8]>) {
        let mut start = record.start;
        let mut end = record.end;
        let mut head = None;
        let mut tail = None;
        if self.options.show_clipping {
            if let Some(len) = record.leading_soft_clip() {
                start -= len as i64;
                head = record.read.get(..len as usize);
            }
            if let Some(len) = record.trailing_soft_clip() {
                end += len as i64;
                tail = record
                    .read
                    .len()
                    .checked_sub(len as usize)
                    .and_then(|from| record.read.get(from..));
            }
        }
        (start, end, head, tail)
    }

    fn grow_reference(&mut self, start: i64, end: i64) -> Result<()> {
        if let Some(buffer) = self.reference.as_mut() {
            if start < buffer.min() {
                buffer.extend_head(start)?;
            }
            if end > buffer.max() {
                buffer.extend_tail(end)?;
            }
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<()> {
        if self.poisoned {
            return Err(TrackError::Poisoned);
        }
        if self.records_seen == 0 {
            return Err(TrackError::NoRecords);
        }
        Ok(())
    }

    /// Coverage at `scale_factor` (pixels per base)
    pub fn base_coverage(&self, scale_factor: f64) -> Result<Vec<BaseCoverage>> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(TrackError::InvalidScaleFactor(scale_factor));
        }
        self.check_readable()?;
        Ok(self.coverage.coverage(scale_factor, self.options.mode))
    }

    /// Splice junctions in no particular order
    pub fn splice_junctions(&self) -> Result<Vec<SpliceJunction>> {
        self.check_readable()?;
        Ok(self.junctions.junctions())
    }

    /// Reference bases from `min_position()` on; None outside FULL mode
    pub fn reference_buffer(&self) -> Option<&[u8]> {
        self.reference.as_ref().map(ReferenceWindowBuffer::as_bytes)
    }

    /// Genomic position of the first reference buffer base
    pub fn min_position(&self) -> i64 {
        self.reference
            .as_ref()
            .map_or(self.window.start(), ReferenceWindowBuffer::min)
    }

    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    pub fn skipped_records(&self) -> usize {
        self.skipped
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn sifter(&self) -> &dyn DownsamplingSifter {
        self.filter.sifter()
    }

    pub fn into_filter(self) -> F {
        self.filter
    }
}
