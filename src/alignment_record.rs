use crate::errors::{CigarParseError, TrackError};
use rust_htslib::bam::record::{Aux, Cigar};
use rust_htslib::bam::Record;

/// An aligned read as consumed by the track handler.
///
/// ## Coordinates
/// - `start`: 1-based position of the first aligned (non-clipped) base
/// - `end`: 1-based inclusive position of the last aligned base
///
/// `read` holds the bases exactly as stored, soft clips included. An empty
/// `read` stands for a record without stored sequence (`*` in SAM).
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub name: String,
    pub start: i64,
    pub end: i64,
    pub flags: u16,
    pub strand: Strand,
    pub cigar: Vec<CigarOp>,
    pub read: Vec<u8>,
    /// Transcript strand hint carried in the `XS` tag by spliced aligners
    pub xs_strand: Option<Strand>,
}

/// Strand orientation for alignments
#[derive(Default, PartialEq, Eq, Hash, Clone, Copy, Debug)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }

    /// Anything but `+` counts as reverse, matching how spliced aligners use `XS:A`
    fn from_tag(value: u8) -> Self {
        if value == b'+' {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

/// SAM flag bits the handler and the read filters look at
pub mod flags {
    pub const UNMAPPED: u16 = 0x4;
    pub const REVERSE: u16 = 0x10;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarKind {
    Match,
    Ins,
    Del,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    Equal,
    Diff,
}

impl CigarKind {
    pub fn from_char(op: char) -> Option<Self> {
        let kind = match op {
            'M' => CigarKind::Match,
            'I' => CigarKind::Ins,
            'D' => CigarKind::Del,
            'N' => CigarKind::Skip,
            'S' => CigarKind::SoftClip,
            'H' => CigarKind::HardClip,
            'P' => CigarKind::Pad,
            '=' => CigarKind::Equal,
            'X' => CigarKind::Diff,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_char(&self) -> char {
        match self {
            CigarKind::Match => 'M',
            CigarKind::Ins => 'I',
            CigarKind::Del => 'D',
            CigarKind::Skip => 'N',
            CigarKind::SoftClip => 'S',
            CigarKind::HardClip => 'H',
            CigarKind::Pad => 'P',
            CigarKind::Equal => '=',
            CigarKind::Diff => 'X',
        }
    }

    pub fn consumes_read(&self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::Ins
                | CigarKind::SoftClip
                | CigarKind::Equal
                | CigarKind::Diff
        )
    }

    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarKind::Match | CigarKind::Del | CigarKind::Skip | CigarKind::Equal | CigarKind::Diff
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    kind: CigarKind,
    len: u32,
}

impl CigarOp {
    pub fn new(len: u32, kind: CigarKind) -> Self {
        Self { kind, len }
    }

    pub fn kind(&self) -> CigarKind {
        self.kind
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read_delta(&self) -> i64 {
        if self.kind.consumes_read() {
            self.len as i64
        } else {
            0
        }
    }

    pub fn reference_delta(&self) -> i64 {
        if self.kind.consumes_reference() {
            self.len as i64
        } else {
            0
        }
    }
}

impl From<&Cigar> for CigarOp {
    fn from(cigar: &Cigar) -> Self {
        match *cigar {
            Cigar::Match(len) => CigarOp::new(len, CigarKind::Match),
            Cigar::Ins(len) => CigarOp::new(len, CigarKind::Ins),
            Cigar::Del(len) => CigarOp::new(len, CigarKind::Del),
            Cigar::RefSkip(len) => CigarOp::new(len, CigarKind::Skip),
            Cigar::SoftClip(len) => CigarOp::new(len, CigarKind::SoftClip),
            Cigar::HardClip(len) => CigarOp::new(len, CigarKind::HardClip),
            Cigar::Pad(len) => CigarOp::new(len, CigarKind::Pad),
            Cigar::Equal(len) => CigarOp::new(len, CigarKind::Equal),
            Cigar::Diff(len) => CigarOp::new(len, CigarKind::Diff),
        }
    }
}

/// Parse a CIGAR string such as `5S20M3N10M` into a vector of CigarOp
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>, CigarParseError> {
    let mut ops = Vec::new();
    let mut len: Option<u32> = None;

    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            let current = len.unwrap_or(0);
            len = Some(
                current
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or(CigarParseError::LengthOverflow)?,
            );
        } else {
            let kind = CigarKind::from_char(c).ok_or(CigarParseError::UnsupportedOperation(c))?;
            let op_len = len.take().ok_or(CigarParseError::MissingLength(c))?;
            ops.push(CigarOp::new(op_len, kind));
        }
    }

    if len.is_some() {
        return Err(CigarParseError::DanglingLength);
    }
    Ok(ops)
}

/// Render CigarOps back into their textual form
pub fn cigar_to_string(ops: &[CigarOp]) -> String {
    ops.iter()
        .map(|op| format!("{}{}", op.len(), op.kind().as_char()))
        .collect()
}

impl AlignmentRecord {
    /// Build a record from its aligned start, a textual CIGAR and the read bases.
    /// The inclusive end is derived from the reference-consuming operations.
    pub fn from_cigar_str(
        name: &str,
        start: i64,
        cigar: &str,
        read: &[u8],
        strand: Strand,
    ) -> Result<Self, CigarParseError> {
        let cigar = parse_cigar(cigar)?;
        let ref_len: i64 = cigar.iter().map(CigarOp::reference_delta).sum();
        let flags = match strand {
            Strand::Forward => 0,
            Strand::Reverse => flags::REVERSE,
        };
        Ok(Self {
            name: name.to_string(),
            start,
            end: start + ref_len - 1,
            flags,
            strand,
            cigar,
            read: read.to_vec(),
            xs_strand: None,
        })
    }

    pub fn with_xs_strand(mut self, strand: Strand) -> Self {
        self.xs_strand = Some(strand);
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Strand assigned to splice junctions opened by this read
    pub fn splice_strand(&self) -> Strand {
        self.xs_strand.unwrap_or(self.strand)
    }

    pub fn leading_soft_clip(&self) -> Option<u32> {
        self.cigar
            .first()
            .filter(|op| op.kind() == CigarKind::SoftClip)
            .map(CigarOp::len)
    }

    pub fn trailing_soft_clip(&self) -> Option<u32> {
        self.cigar
            .last()
            .filter(|op| op.kind() == CigarKind::SoftClip)
            .map(CigarOp::len)
    }

    /// Check that the CIGAR agrees with the stored bases and the aligned span
    pub fn check_cigar(&self) -> Result<(), TrackError> {
        let malformed = |reason: String| TrackError::MalformedCigar {
            read: self.name.clone(),
            reason,
        };

        let read_len: i64 = self.cigar.iter().map(CigarOp::read_delta).sum();
        if !self.read.is_empty() && read_len != self.read.len() as i64 {
            return Err(malformed(format!(
                "CIGAR consumes {} read bases but the read has {}",
                read_len,
                self.read.len()
            )));
        }

        let ref_len: i64 = self.cigar.iter().map(CigarOp::reference_delta).sum();
        if ref_len != self.end - self.start + 1 {
            return Err(malformed(format!(
                "CIGAR spans {} reference bases but the alignment covers {}-{}",
                ref_len, self.start, self.end
            )));
        }
        Ok(())
    }
}

impl TryFrom<&Record> for AlignmentRecord {
    type Error = TrackError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let name = String::from_utf8(record.qname().to_vec())
            .map_err(|e| TrackError::InvalidRecord(format!("read name is not UTF-8: {e}")))?;
        let cigar_view = record.cigar();
        let cigar: Vec<CigarOp> = cigar_view.iter().map(CigarOp::from).collect();
        // htslib positions are 0-based; end_pos is exclusive, i.e. the 1-based inclusive end
        let start = record.pos() + 1;
        let end = cigar_view.end_pos();
        let xs_strand = match record.aux(b"XS") {
            Ok(Aux::Char(value)) => Some(Strand::from_tag(value)),
            Ok(Aux::String(value)) => value.bytes().next().map(Strand::from_tag),
            _ => None,
        };
        let strand = if record.is_reverse() {
            Strand::Reverse
        } else {
            Strand::Forward
        };

        Ok(Self {
            name,
            start,
            end,
            flags: record.flags(),
            strand,
            cigar,
            read: record.seq().as_bytes(),
            xs_strand,
        })
    }
}
