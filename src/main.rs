use bamtrack::commands::regions::{parse_bed_file, parse_region, Region};
use bamtrack::commands::track::{
    run_tracks, write_coverage, write_junctions, write_reads, RegionTrack, TrackConfig,
};
use bamtrack::faidx::FastaIndex;
use bamtrack::filter::ReadFlagFilter;
use bamtrack::options::{TrackMode, DEFAULT_REFERENCE_STEP};
use bamtrack::sequence_index::ReferenceProvider;
use clap::Parser;
use log::info;
use rayon::ThreadPoolBuilder;
use std::io::{self, BufWriter, Write};
use std::num::NonZeroUsize;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Path to the coordinate-sorted, indexed BAM file.
    #[clap(short = 'b', long, value_parser)]
    bam_file: String,

    /// Region to aggregate, as `contig:start-end` (1-based, inclusive).
    #[clap(short = 'r', long, value_parser, conflicts_with = "bed_file")]
    region: Option<String>,

    /// BED file with regions to aggregate (plain or BGZF-compressed).
    #[clap(long, value_parser)]
    bed_file: Option<String>,

    /// Indexed FASTA file(s) with the reference sequences (required in full mode).
    #[clap(short = 'f', long, value_parser, num_args = 1..)]
    fasta_files: Vec<String>,

    /// Bases fetched from the reference per buffer extension.
    #[clap(long, value_parser, default_value_t = DEFAULT_REFERENCE_STEP)]
    reference_step: i64,

    /// Show soft-clipped bases as part of the reads.
    #[clap(long, action)]
    show_clipping: bool,

    /// Exclude reads flagged as PCR or optical duplicates.
    #[clap(long, action)]
    no_duplicates: bool,

    /// Exclude secondary alignments.
    #[clap(long, action)]
    no_secondary: bool,

    /// Exclude supplementary alignments.
    #[clap(long, action)]
    no_supplementary: bool,

    /// Exclude reads failing vendor quality checks.
    #[clap(long, action)]
    no_qc_fail: bool,

    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN))]
    threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

/// Command-line tool for aggregating alignment tracks from BAM files.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Read depth per position, or max-pooled per bin when zoomed out
    Coverage {
        #[clap(flatten)]
        common: CommonOpts,

        /// Aggregation mode (full adds per-base mismatch and indel counts)
        #[clap(short = 'm', long, value_enum, default_value_t = TrackMode::Summary)]
        mode: TrackMode,

        /// Pixels per base; values below 1 max-pool the depth into bins of round(1/scale) bases
        #[clap(short = 's', long, value_parser, default_value_t = 1.0)]
        scale_factor: f64,
    },
    /// Splice junctions with their read counts
    Junctions {
        #[clap(flatten)]
        common: CommonOpts,
    },
    /// Admitted reads with their mismatches against the reference
    Reads {
        #[clap(flatten)]
        common: CommonOpts,

        /// Downsampling frame, in bases of read start position
        #[clap(long, value_parser, requires = "downsample_count")]
        downsample_frame: Option<i64>,

        /// Maximum number of reads kept per downsampling frame
        #[clap(long, value_parser, requires = "downsample_frame")]
        downsample_count: Option<usize>,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Coverage {
            common,
            mode,
            scale_factor,
        } => {
            let config = track_config(&common, mode, scale_factor, false, None);
            let tracks = run(&common, &config)?;
            let mut out = BufWriter::new(io::stdout().lock());
            write_coverage(&mut out, &tracks, mode)?;
            out.flush()?;
        }
        Args::Junctions { common } => {
            let mut config = track_config(&common, TrackMode::Summary, 1.0, false, None);
            config.show_splice_junction = true;
            let tracks = run(&common, &config)?;
            let mut out = BufWriter::new(io::stdout().lock());
            write_junctions(&mut out, &tracks)?;
            out.flush()?;
        }
        Args::Reads {
            common,
            downsample_frame,
            downsample_count,
        } => {
            let downsampling = downsample_frame.zip(downsample_count);
            // Mismatches need the reference
            let mode = if common.fasta_files.is_empty() {
                TrackMode::Summary
            } else {
                TrackMode::Full
            };
            let config = track_config(&common, mode, 1.0, true, downsampling);
            let tracks = run(&common, &config)?;
            let mut out = BufWriter::new(io::stdout().lock());
            write_reads(&mut out, &tracks)?;
            out.flush()?;
        }
    }

    Ok(())
}

fn track_config(
    common: &CommonOpts,
    mode: TrackMode,
    scale_factor: f64,
    keep_reads: bool,
    downsampling: Option<(i64, usize)>,
) -> TrackConfig {
    TrackConfig {
        bam_file: common.bam_file.clone(),
        mode,
        scale_factor,
        show_clipping: common.show_clipping,
        show_splice_junction: false,
        reference_step: common.reference_step,
        read_filter: ReadFlagFilter {
            duplicates: common.no_duplicates,
            secondary: common.no_secondary,
            supplementary: common.no_supplementary,
            qc_fail: common.no_qc_fail,
        },
        downsampling,
        keep_reads,
    }
}

/// Initialize logging and the thread pool, then aggregate every requested region
fn run(common: &CommonOpts, config: &TrackConfig) -> io::Result<Vec<RegionTrack>> {
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    ThreadPoolBuilder::new()
        .num_threads(common.threads.into())
        .build_global()
        .map_err(|e| io::Error::other(format!("Failed to build thread pool: {}", e)))?;

    let regions = load_regions(common)?;

    let fasta_index = if common.fasta_files.is_empty() {
        None
    } else {
        info!("Indexing {} FASTA file(s)", common.fasta_files.len());
        Some(FastaIndex::build_from_files(&common.fasta_files)?)
    };
    let reference = fasta_index
        .as_ref()
        .map(|index| index as &(dyn ReferenceProvider + Sync));

    Ok(run_tracks(config, reference, regions)?)
}

fn load_regions(common: &CommonOpts) -> io::Result<Vec<Region>> {
    if let Some(region) = &common.region {
        Ok(vec![parse_region(region)?])
    } else if let Some(bed_file) = &common.bed_file {
        let regions = parse_bed_file(bed_file)?;
        info!("Parsed {} regions from BED file", regions.len());
        Ok(regions)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Either --region or --bed-file must be provided",
        ))
    }
}
