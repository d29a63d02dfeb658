use crate::alignment_record::AlignmentRecord;
use crate::commands::regions::{sort_regions, toggle_chr_prefix, Region};
use crate::coverage::BaseCoverage;
use crate::errors::{Result, TrackError};
use crate::filter::{AlignedRead, FrameSifter, ReadCollector, ReadFlagFilter};
use crate::handler::{AddOutcome, Handler};
use crate::options::{QueryOptions, TrackMode};
use crate::sequence_index::ReferenceProvider;
use crate::splice::SpliceJunction;
use crate::window::GenomicWindow;
use log::{debug, info, warn};
use rayon::prelude::*;
use rust_htslib::bam::{self, HeaderView, Read};
use std::io::{self, Write};

/// Configuration shared by every region of a track run
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub bam_file: String,
    pub mode: TrackMode,
    pub scale_factor: f64,
    pub show_clipping: bool,
    pub show_splice_junction: bool,
    pub reference_step: i64,
    pub read_filter: ReadFlagFilter,
    /// `(frame, count)`: keep at most `count` reads per `frame` bases
    pub downsampling: Option<(i64, usize)>,
    /// Keep admitted reads for per-read output
    pub keep_reads: bool,
}

/// Aggregated result of one region
#[derive(Debug)]
pub struct RegionTrack {
    pub region: Region,
    /// Contig name as found in the BAM header
    pub contig: String,
    pub coverage: Vec<BaseCoverage>,
    pub junctions: Vec<SpliceJunction>,
    pub reads: Vec<AlignedRead>,
    pub records: usize,
    pub prefiltered: usize,
    pub skipped: usize,
    pub downsampled: usize,
}

/// Header id and name of `contig`, retrying with the `chr` prefix toggled
fn resolve_contig(header: &HeaderView, contig: &str) -> Result<(u32, String)> {
    if let Some(tid) = header.tid(contig.as_bytes()) {
        return Ok((tid, contig.to_string()));
    }
    let alternative = toggle_chr_prefix(contig);
    if let Some(tid) = header.tid(alternative.as_bytes()) {
        warn!(
            "Contig '{}' not found in alignment header, using '{}'",
            contig, alternative
        );
        return Ok((tid, alternative));
    }
    Err(TrackError::UnknownContig(contig.to_string()))
}

fn admission_filter(config: &TrackConfig, region: &Region) -> ReadCollector {
    if !config.keep_reads {
        return ReadCollector::coverage_only();
    }
    let sifter = match config.downsampling {
        Some((frame, count)) => FrameSifter::new(region.start, frame, count),
        None => FrameSifter::unbounded(),
    };
    ReadCollector::new(sifter)
}

/// Aggregate the reads of a single region
pub fn track_region(
    config: &TrackConfig,
    reference: Option<&dyn ReferenceProvider>,
    region: Region,
) -> Result<RegionTrack> {
    let mut reader = bam::IndexedReader::from_path(&config.bam_file)?;
    let (tid, contig) = resolve_contig(reader.header(), &region.contig)?;
    reader.fetch((tid, region.start - 1, region.end))?;

    let window = GenomicWindow::new(region.start, region.end)?;
    let options = QueryOptions::new(&contig, config.mode)
        .with_clipping(config.show_clipping)
        .with_splice_junctions(config.show_splice_junction)
        .with_reference_id(tid as u64)
        .with_reference_step(config.reference_step);
    let mut handler = Handler::new(window, reference, admission_filter(config, &region), options)?;

    let mut prefiltered = 0;
    let mut record = bam::Record::new();
    while let Some(result) = reader.read(&mut record) {
        result?;
        if !config.read_filter.passes(record.flags()) {
            prefiltered += 1;
            continue;
        }
        let alignment = match AlignmentRecord::try_from(&record) {
            Ok(alignment) => alignment,
            Err(e) => {
                debug!("Skipping record in {}: {}", region.label(), e);
                prefiltered += 1;
                continue;
            }
        };
        if handler.add(&alignment)? == AddOutcome::Unusable {
            debug!("Ignoring unusable record '{}'", alignment.name);
        }
    }

    // A region without reads is empty, not an error
    let (coverage, mut junctions) = if handler.records_seen() == 0 {
        (Vec::new(), Vec::new())
    } else {
        (
            handler.base_coverage(config.scale_factor)?,
            handler.splice_junctions()?,
        )
    };
    junctions.sort_by_key(|j| (j.start, j.end, j.strand as u8));

    let records = handler.records_seen();
    let skipped = handler.skipped_records();
    let downsampled = handler.sifter().dropped();
    info!(
        "{}: {} records, {} prefiltered, {} skipped, {} downsampled, {} coverage entries, {} junctions",
        region.label(),
        records,
        prefiltered,
        skipped,
        downsampled,
        coverage.len(),
        junctions.len()
    );

    Ok(RegionTrack {
        region,
        contig,
        coverage,
        junctions,
        reads: handler.into_filter().into_reads(),
        records,
        prefiltered,
        skipped,
        downsampled,
    })
}

/// Aggregate all regions in parallel; results come back in natural contig order
pub fn run_tracks(
    config: &TrackConfig,
    reference: Option<&(dyn ReferenceProvider + Sync)>,
    mut regions: Vec<Region>,
) -> Result<Vec<RegionTrack>> {
    if !config.scale_factor.is_finite() || config.scale_factor <= 0.0 {
        return Err(TrackError::InvalidScaleFactor(config.scale_factor));
    }
    if config.mode == TrackMode::Full && reference.is_none() {
        return Err(TrackError::MissingReference);
    }

    sort_regions(&mut regions);
    info!("Processing {} regions", regions.len());
    regions
        .into_par_iter()
        .map(|region| {
            let reference = reference.map(|r| r as &dyn ReferenceProvider);
            track_region(config, reference, region)
        })
        .collect()
}

pub fn write_coverage<W: Write>(out: &mut W, tracks: &[RegionTrack], mode: TrackMode) -> io::Result<()> {
    if mode == TrackMode::Full {
        writeln!(out, "#contig\tstart\tend\tdepth\tA\tC\tG\tT\tN\tdel\tins")?;
    } else {
        writeln!(out, "#contig\tstart\tend\tdepth")?;
    }
    for track in tracks {
        for entry in &track.coverage {
            write!(out, "{}\t{}\t{}\t{}", track.contig, entry.start, entry.end, entry.value)?;
            if let Some(b) = &entry.breakdown {
                write!(
                    out,
                    "\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    b.a, b.c, b.g, b.t, b.n, b.del, b.ins
                )?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_junctions<W: Write>(out: &mut W, tracks: &[RegionTrack]) -> io::Result<()> {
    writeln!(out, "#contig\tstart\tend\tstrand\tcount")?;
    for track in tracks {
        for junction in &track.junctions {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                track.contig,
                junction.start,
                junction.end,
                junction.strand.as_char(),
                junction.count
            )?;
        }
    }
    Ok(())
}

fn bases_or_dot(bases: Option<&[u8]>) -> String {
    match bases {
        Some(bases) if !bases.is_empty() => String::from_utf8_lossy(bases).into_owned(),
        _ => ".".to_string(),
    }
}

pub fn write_reads<W: Write>(out: &mut W, tracks: &[RegionTrack]) -> io::Result<()> {
    writeln!(
        out,
        "#contig\tname\tstart\tend\tstrand\tcigar\tflags\tmismatches\thead\ttail"
    )?;
    for track in tracks {
        for read in &track.reads {
            let mismatches = match &read.mismatches {
                Some(list) if !list.is_empty() => list
                    .iter()
                    .map(|m| format!("{}:{}", m.offset, m.base as char))
                    .collect::<Vec<_>>()
                    .join(","),
                _ => ".".to_string(),
            };
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                track.contig,
                read.name,
                read.start,
                read.end,
                read.strand.as_char(),
                read.cigar,
                read.flags,
                mismatches,
                bases_or_dot(read.head.as_deref()),
                bases_or_dot(read.tail.as_deref())
            )?;
        }
    }
    Ok(())
}
