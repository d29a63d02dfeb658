use bamtrack::commands::regions::{parse_region, Region};
use bamtrack::commands::track::{run_tracks, write_coverage, TrackConfig};
use bamtrack::errors::TrackError;
use bamtrack::filter::ReadFlagFilter;
use bamtrack::options::TrackMode;
use bamtrack::sequence_index::{InMemoryReference, ReferenceProvider};
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::record::{Aux, Cigar, CigarString};
use rust_htslib::bam::{self, Format, Header, Writer};
use std::path::Path;

const DUPLICATE: u16 = 0x400;

/// chr1 with ACGT repeats from position 1
fn contig() -> Vec<u8> {
    b"ACGT".iter().cycle().take(1000).copied().collect()
}

fn alignment(name: &str, pos: i64, cigar: Vec<Cigar>, seq: &[u8], flags: u16) -> bam::Record {
    let mut record = bam::Record::new();
    record.set(name.as_bytes(), Some(&CigarString(cigar)), seq, &vec![30; seq.len()]);
    record.set_tid(0);
    record.set_pos(pos);
    record.set_mapq(60);
    record.set_flags(flags);
    record
}

/// Write a sorted, indexed BAM with a handful of reads on chr1
fn write_bam(path: &Path) {
    let mut header = Header::new();
    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chr1");
    sq.push_tag(b"LN", 1000);
    header.push_record(&sq);

    let contig = contig();
    let mut writer = Writer::from_path(path, &header, Format::Bam).unwrap();
    // 101..=110, identical to the reference
    writer
        .write(&alignment("plain", 100, vec![Cigar::Match(10)], &contig[100..110], 0))
        .unwrap();
    // Same span, flagged as duplicate
    writer
        .write(&alignment("dup", 100, vec![Cigar::Match(10)], &contig[100..110], DUPLICATE))
        .unwrap();
    // 106..=110, intron 111..=120, 121..=125
    let mut spliced_seq = contig[105..110].to_vec();
    spliced_seq.extend_from_slice(&contig[120..125]);
    let mut spliced = alignment(
        "spliced",
        105,
        vec![Cigar::Match(5), Cigar::RefSkip(10), Cigar::Match(5)],
        &spliced_seq,
        0,
    );
    spliced.push_aux(b"XS", Aux::Char(b'-')).unwrap();
    writer.write(&spliced).unwrap();
    drop(writer);

    bam::index::build(path, None, bam::index::Type::Bai, 1).unwrap();
}

fn config(bam_file: &Path, mode: TrackMode) -> TrackConfig {
    TrackConfig {
        bam_file: bam_file.to_string_lossy().into_owned(),
        mode,
        scale_factor: 1.0,
        show_clipping: false,
        show_splice_junction: true,
        reference_step: 100,
        read_filter: ReadFlagFilter::default(),
        downsampling: None,
        keep_reads: true,
    }
}

#[test]
fn test_tracks_from_indexed_bam() {
    let dir = tempfile::tempdir().unwrap();
    let bam_path = dir.path().join("reads.bam");
    write_bam(&bam_path);

    let mut reference = InMemoryReference::new();
    reference.add_contig("chr1", &contig());
    let reference: &(dyn ReferenceProvider + Sync) = &reference;

    let mut config = config(&bam_path, TrackMode::Full);
    config.read_filter.duplicates = true;
    let tracks = run_tracks(&config, Some(reference), vec![parse_region("chr1:95-130").unwrap()]).unwrap();
    assert_eq!(tracks.len(), 1);
    let track = &tracks[0];

    assert_eq!(track.prefiltered, 1);
    assert_eq!(track.records, 2);
    assert_eq!(track.reads.len(), 2);
    assert!(track.reads.iter().all(|r| r.mismatches == Some(Vec::new())));

    let depth: Vec<(i64, u32)> = track.coverage.iter().map(|c| (c.start, c.value)).collect();
    let expected: Vec<(i64, u32)> = (101..=110)
        .map(|pos| (pos, if pos >= 106 { 2 } else { 1 }))
        .chain((121..=125).map(|pos| (pos, 1)))
        .collect();
    assert_eq!(depth, expected);

    assert_eq!(track.junctions.len(), 1);
    let junction = &track.junctions[0];
    assert_eq!((junction.start, junction.end, junction.count), (110, 120, 1));
    assert_eq!(junction.strand.as_char(), '-');

    let mut out = Vec::new();
    write_coverage(&mut out, &tracks, TrackMode::Full).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1 + expected.len());
}

#[test]
fn test_contig_name_fallback_and_unknown_contig() {
    let dir = tempfile::tempdir().unwrap();
    let bam_path = dir.path().join("reads.bam");
    write_bam(&bam_path);
    let config = config(&bam_path, TrackMode::Summary);

    let region = Region {
        contig: "1".to_string(),
        start: 95,
        end: 130,
        name: None,
    };
    let tracks = run_tracks(&config, None, vec![region]).unwrap();
    assert_eq!(tracks[0].contig, "chr1");
    // The duplicate counts when not filtered
    assert_eq!(tracks[0].records, 3);
    assert!(tracks[0].reads.iter().all(|r| r.mismatches.is_none()));

    let missing = run_tracks(&config, None, vec![parse_region("chrZ:1-10").unwrap()]);
    assert!(matches!(missing, Err(TrackError::UnknownContig(name)) if name == "chrZ"));
}

#[test]
fn test_empty_region_yields_empty_track() {
    let dir = tempfile::tempdir().unwrap();
    let bam_path = dir.path().join("reads.bam");
    write_bam(&bam_path);
    let config = config(&bam_path, TrackMode::Summary);

    let tracks = run_tracks(&config, None, vec![parse_region("chr1:500-600").unwrap()]).unwrap();
    assert_eq!(tracks[0].records, 0);
    assert!(tracks[0].coverage.is_empty());
    assert!(tracks[0].junctions.is_empty());
}

#[test]
fn test_full_mode_requires_a_reference() {
    let config = config(Path::new("unused.bam"), TrackMode::Full);
    let result = run_tracks(&config, None, vec![parse_region("chr1:1-10").unwrap()]);
    assert!(matches!(result, Err(TrackError::MissingReference)));
}
