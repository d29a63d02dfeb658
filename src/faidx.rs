use log::debug;
use rust_htslib::faidx;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;

// Per-thread FASTA readers, bounded so that wide thread pools do not exhaust file handles
struct FaidxCache {
    capacity: usize,
    readers: HashMap<String, faidx::Reader>,
}

impl FaidxCache {
    fn new(capacity: usize) -> Self {
        FaidxCache {
            capacity,
            readers: HashMap::with_capacity(capacity),
        }
    }

    fn get_or_open(&mut self, path: &str) -> io::Result<&mut faidx::Reader> {
        if !self.readers.contains_key(path) && self.readers.len() >= self.capacity {
            if let Some(key_to_remove) = self.readers.keys().next().cloned() {
                self.readers.remove(&key_to_remove);
            }
        }

        match self.readers.entry(path.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("Opening FASTA reader for {path}");
                let reader = faidx::Reader::from_path(path).map_err(|e| {
                    io::Error::other(format!("Failed to open FASTA file '{path}': {e}"))
                })?;
                Ok(entry.insert(reader))
            }
        }
    }
}

thread_local! {
    static FAIDX_CACHE: RefCell<FaidxCache> = RefCell::new(FaidxCache::new(10));
}

/// Contig lookup over one or more indexed FASTA files
#[derive(Debug)]
pub struct FastaIndex {
    pub fasta_paths: Vec<String>,
    pub path_key_to_fasta: FxHashMap<String, usize>,
    pub sequence_lengths: FxHashMap<String, usize>,
}

impl FastaIndex {
    fn new() -> Self {
        FastaIndex {
            fasta_paths: Vec::new(),
            path_key_to_fasta: FxHashMap::default(),
            sequence_lengths: FxHashMap::default(),
        }
    }

    pub fn build_from_files(fasta_files: &[String]) -> io::Result<Self> {
        if fasta_files.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "No FASTA files provided",
            ));
        }
        let mut index = FastaIndex::new();

        for (fasta_idx, fasta_path) in fasta_files.iter().enumerate() {
            index.fasta_paths.push(fasta_path.clone());

            let fai_path = format!("{fasta_path}.fai");
            let fai_content = match std::fs::read_to_string(&fai_path) {
                Ok(content) => content,
                Err(_) => {
                    // Opening through htslib writes the missing .fai next to the FASTA
                    faidx::Reader::from_path(fasta_path).map_err(|e| {
                        io::Error::other(format!(
                            "Failed to create FASTA index for '{fasta_path}': {e}"
                        ))
                    })?;
                    std::fs::read_to_string(&fai_path)?
                }
            };

            index.add_fai_entries(&fai_content, fasta_idx);
        }

        Ok(index)
    }

    fn add_fai_entries(&mut self, fai_content: &str, fasta_idx: usize) {
        for line in fai_content.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 || fields[0].is_empty() {
                continue;
            }
            let seq_name = fields[0];
            self.path_key_to_fasta
                .insert(seq_name.to_string(), fasta_idx);
            if let Ok(length) = fields[1].parse::<usize>() {
                self.sequence_lengths.insert(seq_name.to_string(), length);
            }
        }
    }

    fn get_fasta_path(&self, seq_name: &str) -> Option<&str> {
        self.path_key_to_fasta
            .get(seq_name)
            .map(|&idx| self.fasta_paths[idx].as_str())
    }

    /// Fetch `[start, end)` (0-based, half-open) of a contig, upper-cased
    pub fn fetch_sequence(&self, seq_name: &str, start: usize, end: usize) -> io::Result<Vec<u8>> {
        let fasta_path = self.get_fasta_path(seq_name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found in any FASTA file"),
            )
        })?;
        if start >= end {
            return Ok(Vec::new());
        }

        FAIDX_CACHE.with(|cache_cell| -> io::Result<Vec<u8>> {
            let mut cache = cache_cell.borrow_mut();
            let reader = cache.get_or_open(fasta_path)?;

            // fetch_seq takes an inclusive end
            match reader.fetch_seq(seq_name, start, end - 1) {
                Ok(seq) => {
                    let mut seq_vec = seq.to_vec();
                    unsafe { libc::free(seq.as_ptr() as *mut std::ffi::c_void) }; // Free up memory to avoid memory leak (bug https://github.com/rust-bio/rust-htslib/issues/401#issuecomment-1704290171)
                    seq_vec.make_ascii_uppercase();
                    Ok(seq_vec)
                }
                Err(e) => Err(io::Error::other(format!(
                    "Failed to fetch sequence for {seq_name}: {e}"
                ))),
            }
        })
    }

    pub fn get_sequence_length(&self, seq_name: &str) -> io::Result<usize> {
        self.sequence_lengths.get(seq_name).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence_index::ReferenceProvider;
    use std::fs;
    use tempfile::TempDir;

    fn write_fasta(dir: &TempDir) -> String {
        let path = dir.path().join("ref.fa");
        fs::write(&path, ">chr1\nacgtACGTAC\nGGGG\n>chr2\nTTTT\n").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_fai_entries_are_indexed() {
        let mut index = FastaIndex::new();
        index.fasta_paths.push("a.fa".to_string());
        index.add_fai_entries("chr1\t248956422\t112\t70\t71\nchrM\t16569\t1\t70\t71\n\n", 0);

        assert_eq!(index.get_sequence_length("chrM").unwrap(), 16569);
        assert_eq!(index.get_fasta_path("chr1"), Some("a.fa"));
        assert!(index.get_sequence_length("chr2").is_err());
    }

    #[test]
    fn test_fetch_through_reference_provider() {
        let dir = TempDir::new().unwrap();
        let fasta = write_fasta(&dir);
        let index = FastaIndex::build_from_files(&[fasta]).unwrap();

        assert_eq!(index.get_sequence_length("chr1").unwrap(), 14);
        assert_eq!(index.get_sequence(1, 4, 0, "chr1").unwrap(), b"ACGT");
        assert_eq!(index.get_sequence(9, 12, 0, "chr1").unwrap(), b"ACGG");
        // Past the contig end the fetch is clamped
        assert_eq!(index.get_sequence(13, 40, 0, "chr1").unwrap(), b"GG");
        assert_eq!(index.get_sequence(1, 4, 0, "chr2").unwrap(), b"TTTT");
        assert!(index.get_sequence(1, 4, 0, "chr3").is_err());
    }
}
