use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackError>;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid track window: end {end} is before start {start}")]
    InvalidWindow { start: i64, end: i64 },
    #[error("scale factor must be finite and positive, got {0}")]
    InvalidScaleFactor(f64),
    #[error("reference step must be positive, got {0}")]
    InvalidReferenceStep(i64),
    #[error("FULL mode requires a reference sequence provider")]
    MissingReference,
    #[error("coverage queried before any record was added")]
    NoRecords,
    #[error("malformed CIGAR for read '{read}': {reason}")]
    MalformedCigar { read: String, reason: String },
    #[error("failed to fetch reference {chromosome}:{start}-{end}: {source}")]
    Reference {
        chromosome: String,
        start: i64,
        end: i64,
        #[source]
        source: io::Error,
    },
    #[error("failed to grow reference buffer: {0}")]
    BufferAllocation(#[from] TryReserveError),
    #[error("handler is unusable after an earlier reference failure")]
    Poisoned,
    #[error("invalid alignment record: {0}")]
    InvalidRecord(String),
    #[error("contig '{0}' is not in the alignment header")]
    UnknownContig(String),
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),
}

/// Errors raised while parsing a textual CIGAR string
#[derive(Debug, Error, PartialEq)]
pub enum CigarParseError {
    #[error("CIGAR operation '{0}' is missing a length")]
    MissingLength(char),
    #[error("unsupported CIGAR operation '{0}'")]
    UnsupportedOperation(char),
    #[error("CIGAR string ends with a dangling length")]
    DanglingLength,
    #[error("CIGAR length overflows")]
    LengthOverflow,
}

impl From<TrackError> for io::Error {
    fn from(err: TrackError) -> Self {
        io::Error::other(err.to_string())
    }
}
