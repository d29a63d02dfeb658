/// Bases fetched per reference buffer extension
pub const DEFAULT_REFERENCE_STEP: i64 = 1000;

/// Level of detail a track is aggregated at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TrackMode {
    /// Per-base breakdown, mismatches and a reference buffer
    Full,
    /// Depth only, max-pooled when zoomed out
    #[default]
    Summary,
}

/// Options of a single track query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub mode: TrackMode,
    pub show_clipping: bool,
    pub show_splice_junction: bool,
    pub chromosome: String,
    pub reference_id: u64,
    pub reference_step: i64,
}

impl QueryOptions {
    pub fn new(chromosome: &str, mode: TrackMode) -> Self {
        Self {
            mode,
            show_clipping: false,
            show_splice_junction: false,
            chromosome: chromosome.to_string(),
            reference_id: 0,
            reference_step: DEFAULT_REFERENCE_STEP,
        }
    }

    pub fn with_clipping(mut self, show_clipping: bool) -> Self {
        self.show_clipping = show_clipping;
        self
    }

    pub fn with_splice_junctions(mut self, show_splice_junction: bool) -> Self {
        self.show_splice_junction = show_splice_junction;
        self
    }

    pub fn with_reference_id(mut self, reference_id: u64) -> Self {
        self.reference_id = reference_id;
        self
    }

    /// Non-positive steps fall back to the default
    pub fn with_reference_step(mut self, step: i64) -> Self {
        self.reference_step = if step > 0 {
            step
        } else {
            DEFAULT_REFERENCE_STEP
        };
        self
    }

    pub fn is_full(&self) -> bool {
        self.mode == TrackMode::Full
    }
}
