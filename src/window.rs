use crate::errors::{Result, TrackError};

/// Inclusive, 1-based genomic interval a track is aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenomicWindow {
    start: i64,
    end: i64,
}

impl GenomicWindow {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if end < start {
            return Err(TrackError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of positions in the window, never zero
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn contains(&self, pos: i64) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Array offset of a genomic position, if it falls inside the window
    pub fn offset(&self, pos: i64) -> Option<usize> {
        self.contains(pos).then(|| (pos - self.start) as usize)
    }

    pub fn position(&self, offset: usize) -> i64 {
        self.start + offset as i64
    }

    /// Clamp `[start, end]` to the window; None when the two are disjoint
    pub fn clamp(&self, start: i64, end: i64) -> Option<(i64, i64)> {
        if end < self.start || start > self.end || end < start {
            return None;
        }
        Some((start.max(self.start), end.min(self.end)))
    }
}
