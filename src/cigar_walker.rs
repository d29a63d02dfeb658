use crate::alignment_record::{CigarKind, CigarOp, Strand};

/// A read base that disagrees with the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchPosition {
    /// Offset from the record's (clip-adjusted) start
    pub offset: i64,
    pub base: u8,
}

/// Receives the per-position events produced while walking one record
pub trait AlignmentSink {
    /// A mismatching base observed at genomic position `pos`
    fn mismatch_base(&mut self, pos: i64, base: u8);
    /// An insertion opening right after genomic position `pos`
    fn insertion(&mut self, pos: i64);
    /// Deleted reference bases `[start, end]`
    fn deletion(&mut self, start: i64, end: i64);
    /// Skipped (intronic) reference bases `[start, end]`
    fn intron(&mut self, start: i64, end: i64, strand: Strand);
}

/// Sink for walks that only need the mismatch list
impl AlignmentSink for () {
    fn mismatch_base(&mut self, _pos: i64, _base: u8) {}
    fn insertion(&mut self, _pos: i64) {}
    fn deletion(&mut self, _start: i64, _end: i64) {}
    fn intron(&mut self, _start: i64, _end: i64, _strand: Strand) {}
}

/// Walks the CIGAR of one record with three cursors:
/// - `read_pos`: offset into the read bases
/// - `ref_bias`: offset into the reference buffer
/// - `corrector`: skew between the two, so that the genomic position of the
///   current read base is always `start + read_pos + corrector`
pub struct CigarWalker<'r> {
    read: &'r [u8],
    reference: Option<&'r [u8]>,
    start: i64,
    buffer_start: i64,
    show_clipping: bool,
    splice_strand: Strand,
    read_pos: usize,
    corrector: i64,
    ref_bias: i64,
}

impl<'r> CigarWalker<'r> {
    /// `start` is the record start, already moved left over a leading soft clip
    /// when clipping is shown. `buffer_start` is the genomic position of
    /// `reference[0]`.
    pub fn new(
        read: &'r [u8],
        reference: Option<&'r [u8]>,
        start: i64,
        buffer_start: i64,
        show_clipping: bool,
        splice_strand: Strand,
    ) -> Self {
        Self {
            read,
            reference,
            start,
            buffer_start,
            show_clipping,
            splice_strand,
            read_pos: 0,
            corrector: 0,
            ref_bias: start - buffer_start,
        }
    }

    pub fn walk<S: AlignmentSink>(mut self, cigar: &[CigarOp], sink: &mut S) -> Vec<MismatchPosition> {
        let mut mismatches = Vec::new();
        for op in cigar {
            let len = op.len() as i64;
            match op.kind() {
                CigarKind::Match | CigarKind::Equal | CigarKind::Diff => {
                    self.walk_match(op.len() as usize, sink, &mut mismatches)
                }
                CigarKind::SoftClip => {
                    if self.show_clipping {
                        self.ref_bias += len;
                    } else {
                        self.corrector -= len;
                    }
                    self.read_pos += op.len() as usize;
                }
                CigarKind::Skip => {
                    let first = self.buffer_start + self.ref_bias;
                    sink.intron(first, first + len - 1, self.splice_strand);
                    self.ref_bias += len;
                    self.corrector += len;
                }
                CigarKind::Del => {
                    let first = self.buffer_start + self.ref_bias;
                    sink.deletion(first, first + len - 1);
                    self.ref_bias += len;
                    self.corrector += len;
                }
                CigarKind::Ins => {
                    sink.insertion(self.genomic_position() - 1);
                    self.read_pos += op.len() as usize;
                    self.corrector -= len;
                }
                CigarKind::HardClip | CigarKind::Pad => {}
            }
        }
        mismatches
    }

    fn genomic_position(&self) -> i64 {
        self.start + self.read_pos as i64 + self.corrector
    }

    fn walk_match<S: AlignmentSink>(
        &mut self,
        len: usize,
        sink: &mut S,
        mismatches: &mut Vec<MismatchPosition>,
    ) {
        for _ in 0..len {
            if let Some(reference) = self.reference {
                let ref_base = usize::try_from(self.ref_bias)
                    .ok()
                    .and_then(|bias| reference.get(bias));
                let read_base = self.read.get(self.read_pos).map(u8::to_ascii_uppercase);
                if let (Some(&ref_base), Some(read_base)) = (ref_base, read_base) {
                    if ref_base != read_base {
                        mismatches.push(MismatchPosition {
                            offset: self.read_pos as i64 + self.corrector,
                            base: read_base,
                        });
                        sink.mismatch_base(self.genomic_position(), read_base);
                    }
                }
            }
            self.ref_bias += 1;
            self.read_pos += 1;
        }
    }
}
