use std::io;

use crate::faidx::FastaIndex;
use rustc_hash::FxHashMap;

/// Source of reference bases for the track handler.
///
/// Coordinates are 1-based and inclusive. Implementations return upper-case
/// bases and may return fewer bases than requested when `end` runs past the
/// end of the contig.
pub trait ReferenceProvider {
    fn get_sequence(
        &self,
        start: i64,
        end: i64,
        reference_id: u64,
        chromosome: &str,
    ) -> io::Result<Vec<u8>>;
}

impl ReferenceProvider for FastaIndex {
    fn get_sequence(
        &self,
        start: i64,
        end: i64,
        _reference_id: u64,
        chromosome: &str,
    ) -> io::Result<Vec<u8>> {
        let contig_len = self.get_sequence_length(chromosome)? as i64;
        let start = start.max(1);
        let end = end.min(contig_len);
        if start > end {
            return Ok(Vec::new());
        }
        // FastaIndex works in 0-based half-open coordinates
        self.fetch_sequence(chromosome, (start - 1) as usize, end as usize)
    }
}

/// Contigs held entirely in memory, keyed by name.
#[derive(Debug, Default)]
pub struct InMemoryReference {
    contigs: FxHashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contig(&mut self, name: &str, sequence: &[u8]) {
        self.contigs
            .insert(name.to_string(), sequence.to_ascii_uppercase());
    }
}

impl ReferenceProvider for InMemoryReference {
    fn get_sequence(
        &self,
        start: i64,
        end: i64,
        _reference_id: u64,
        chromosome: &str,
    ) -> io::Result<Vec<u8>> {
        let contig = self.contigs.get(chromosome).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{chromosome}' not found"),
            )
        })?;
        let start = start.max(1);
        let end = end.min(contig.len() as i64);
        if start > end {
            return Ok(Vec::new());
        }
        Ok(contig[(start - 1) as usize..end as usize].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_reference_is_one_based_inclusive() {
        let mut reference = InMemoryReference::new();
        reference.add_contig("chr1", b"acgtACGTNN");

        assert_eq!(reference.get_sequence(1, 4, 0, "chr1").unwrap(), b"ACGT");
        assert_eq!(reference.get_sequence(5, 5, 0, "chr1").unwrap(), b"A");
        // Clamped at the end of the contig
        assert_eq!(reference.get_sequence(9, 20, 0, "chr1").unwrap(), b"NN");
        assert!(reference.get_sequence(11, 20, 0, "chr1").unwrap().is_empty());
        assert!(reference.get_sequence(1, 4, 0, "chr2").is_err());
    }
}
