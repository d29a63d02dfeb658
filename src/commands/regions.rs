use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

/// A requested track window, 1-based inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub contig: String,
    pub start: i64,
    pub end: i64,
    pub name: Option<String>,
}

impl Region {
    pub fn label(&self) -> String {
        format!("{}:{}-{}", self.contig, self.start, self.end)
    }
}

/// Parse `contig:start-end` (1-based inclusive). The contig may itself contain ':'.
pub fn parse_region(text: &str) -> io::Result<Region> {
    let (contig, range) = text.rsplit_once(':').ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "Region format should be `contig:start-end`",
        )
    })?;
    let (start, end) = range.split_once('-').ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Range format should be `start-end`")
    })?;
    let start = parse_position(start.replace(',', "").as_str(), "start")?;
    let end = parse_position(end.replace(',', "").as_str(), "end")?;
    if start < 1 || end < start {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid region '{}': expected 1 <= start <= end", text),
        ));
    }

    Ok(Region {
        contig: contig.to_string(),
        start,
        end,
        name: None,
    })
}

fn parse_position(value: &str, what: &str) -> io::Result<i64> {
    value.trim().parse::<i64>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid {} value '{}'", what, value),
        )
    })
}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a BGZF block header
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => Ok(header[0..2] == [0x1f, 0x8b]
            && header[2] == 0x08
            && header[3] == 0x04
            && header[12..14] == [b'B', b'C']),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Read regions from a BED file, plain or BGZF-compressed
pub fn parse_bed_file(bed_file: &str) -> io::Result<Vec<Region>> {
    let mut file = File::open(bed_file)?;
    let reader: Box<dyn BufRead> = if is_bgzf(&mut file)? {
        debug!("Reading {} as BGZF", bed_file);
        Box::new(BufReader::new(bgzf::io::Reader::new(file)))
    } else if [".gz", ".bgz"].iter().any(|e| bed_file.ends_with(e)) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > regions.bed.gz",
                bed_file, bed_file
            ),
        ));
    } else {
        Box::new(BufReader::new(file))
    };
    read_bed(reader)
}

/// BED intervals are 0-based half-open; they are converted to 1-based inclusive.
/// Header, comment and blank lines are ignored.
pub fn read_bed<R: BufRead>(reader: R) -> io::Result<Vec<Region>> {
    let mut regions = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
        {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid BED line {}: expected at least 3 columns", line_no + 1),
            ));
        }
        let start = parse_position(parts[1], "start")?;
        let end = parse_position(parts[2], "end")?;
        if start < 0 || start >= end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid BED line {}: start must be less than end", line_no + 1),
            ));
        }

        regions.push(Region {
            contig: parts[0].to_string(),
            start: start + 1,
            end,
            name: parts.get(3).map(|s| s.to_string()),
        });
    }
    Ok(regions)
}

/// Natural contig order (chr2 before chr10), then by position
pub fn sort_regions(regions: &mut [Region]) {
    regions.sort_by(|a, b| {
        natord::compare(&a.contig, &b.contig)
            .then(a.start.cmp(&b.start))
            .then(a.end.cmp(&b.end))
    });
}

/// The same contig name with the `chr` prefix added or removed
pub fn toggle_chr_prefix(contig: &str) -> String {
    match contig.strip_prefix("chr") {
        Some(stripped) => stripped.to_string(),
        None => format!("chr{}", contig),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_region() {
        let region = parse_region("chr1:1,000-2,000").unwrap();
        assert_eq!((region.contig.as_str(), region.start, region.end), ("chr1", 1000, 2000));

        let region = parse_region("HLA:A*01:10-10").unwrap();
        assert_eq!(region.contig, "HLA:A*01");
        assert_eq!(region.label(), "HLA:A*01:10-10");

        assert!(parse_region("chr1").is_err());
        assert!(parse_region("chr1:20-10").is_err());
        assert!(parse_region("chr1:0-10").is_err());
        assert!(parse_region("chr1:a-10").is_err());
    }

    #[test]
    fn test_read_bed_converts_coordinates() {
        let bed = "track name=test\n# comment\nchr1\t99\t110\tpeak\n\nchr2\t0\t5\n";
        let regions = read_bed(Cursor::new(bed)).unwrap();
        assert_eq!(
            regions,
            vec![
                Region {
                    contig: "chr1".to_string(),
                    start: 100,
                    end: 110,
                    name: Some("peak".to_string()),
                },
                Region {
                    contig: "chr2".to_string(),
                    start: 1,
                    end: 5,
                    name: None,
                },
            ]
        );
        assert!(read_bed(Cursor::new("chr1\t10\n")).is_err());
        assert!(read_bed(Cursor::new("chr1\t10\t10\n")).is_err());
    }

    #[test]
    fn test_parse_bed_file_plain_and_bgzf() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("regions.bed");
        std::fs::write(&plain, "chr1\t0\t10\n").unwrap();
        let regions = parse_bed_file(plain.to_str().unwrap()).unwrap();
        assert_eq!((regions[0].start, regions[0].end), (1, 10));

        let compressed = dir.path().join("regions.bed.gz");
        let mut writer = bgzf::io::Writer::new(File::create(&compressed).unwrap());
        writer.write_all(b"chr3\t4\t8\n").unwrap();
        writer.finish().unwrap();
        let regions = parse_bed_file(compressed.to_str().unwrap()).unwrap();
        assert_eq!(regions[0].contig, "chr3");
        assert_eq!((regions[0].start, regions[0].end), (5, 8));
    }

    #[test]
    fn test_sort_regions_naturally() {
        let mut regions: Vec<Region> = ["chr10:1-5", "chr2:50-60", "chr2:1-5", "chrX:1-2"]
            .iter()
            .map(|r| parse_region(r).unwrap())
            .collect();
        sort_regions(&mut regions);
        let labels: Vec<String> = regions.iter().map(Region::label).collect();
        assert_eq!(labels, vec!["chr2:1-5", "chr2:50-60", "chr10:1-5", "chrX:1-2"]);
    }

    #[test]
    fn test_toggle_chr_prefix() {
        assert_eq!(toggle_chr_prefix("chr7"), "7");
        assert_eq!(toggle_chr_prefix("7"), "chr7");
    }
}
