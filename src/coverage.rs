use crate::options::TrackMode;
use crate::window::GenomicWindow;

/// Delta-encoded tracks of the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaTrack {
    Total,
    Deletion,
}

const NUM_BASES: usize = 5; // A, C, G, T, N

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        b'N' => Some(4),
        _ => None,
    }
}

/// Mismatch and indel counts at one position (FULL mode only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BaseBreakdown {
    pub a: u32,
    pub c: u32,
    pub g: u32,
    pub t: u32,
    pub n: u32,
    /// Reads with a deletion over the position
    pub del: u32,
    /// Insertions opening right after the position
    pub ins: u32,
}

/// Depth over `[start, end]`; a single position unless summarized
#[derive(Debug, Clone, PartialEq)]
pub struct BaseCoverage {
    pub start: i64,
    pub end: i64,
    pub value: u32,
    pub breakdown: Option<BaseBreakdown>,
}

impl BaseCoverage {
    fn point(pos: i64, value: u32) -> Self {
        Self {
            start: pos,
            end: pos,
            value,
            breakdown: None,
        }
    }
}

/// Read depth over a track window.
///
/// `total` and `del` hold +1/-1 pairs at interval boundaries and only become
/// depths after a prefix sum at read-out, so adding an interval is O(1) no
/// matter how long it is.
#[derive(Debug, Clone)]
pub struct CoverageAccumulator {
    window: GenomicWindow,
    total: Vec<i32>,
    del: Vec<i32>,
    bases: [Vec<u32>; NUM_BASES],
    ins: Vec<u32>,
}

impl CoverageAccumulator {
    pub fn new(window: GenomicWindow) -> Self {
        let len = window.len();
        Self {
            window,
            total: vec![0; len],
            del: vec![0; len],
            bases: std::array::from_fn(|_| vec![0; len]),
            ins: vec![0; len],
        }
    }

    /// Add (or remove) one unit of depth over `[start, end]`
    pub fn add_interval(&mut self, start: i64, end: i64, track: DeltaTrack, increase: bool) {
        let Some((from, to)) = self.window.clamp(start, end) else {
            return;
        };
        let k = if increase { 1 } else { -1 };
        let array = match track {
            DeltaTrack::Total => &mut self.total,
            DeltaTrack::Deletion => &mut self.del,
        };
        array[(from - self.window.start()) as usize] += k;
        if to < self.window.end() {
            array[(to - self.window.start() + 1) as usize] -= k;
        }
    }

    /// Count an observed read base at `pos`; bases other than ACGTN are ignored
    pub fn add_base(&mut self, pos: i64, base: u8) {
        if let (Some(offset), Some(idx)) = (self.window.offset(pos), base_index(base)) {
            self.bases[idx][offset] += 1;
        }
    }

    pub fn add_insertion(&mut self, pos: i64) {
        if let Some(offset) = self.window.offset(pos) {
            self.ins[offset] += 1;
        }
    }

    /// Depth at every position of the window, materialized by a prefix sum
    pub fn depths(&self) -> Vec<u32> {
        let mut depth = 0i64;
        let mut del_depth = 0i64;
        self.total
            .iter()
            .zip(&self.del)
            .map(|(&t, &d)| {
                depth += t as i64;
                del_depth += d as i64;
                (depth - del_depth).max(0) as u32
            })
            .collect()
    }

    /// Read out coverage at the requested resolution.
    ///
    /// Zoomed out (`scale_factor < 1`) in SUMMARY mode the window is cut into
    /// bins of `round(1 / scale_factor)` bases and each bin reports the highest
    /// depth inside it, so narrow peaks stay visible.
    pub fn coverage(&self, scale_factor: f64, mode: TrackMode) -> Vec<BaseCoverage> {
        if scale_factor < 1.0 && mode != TrackMode::Full {
            return self.summarized(scale_factor);
        }

        let mut depth = 0i64;
        let mut del_depth = 0i64;
        let mut out = Vec::new();
        for i in 0..self.total.len() {
            depth += self.total[i] as i64;
            del_depth += self.del[i] as i64;
            let value = depth - del_depth;
            if value <= 0 {
                continue;
            }
            let mut coverage = BaseCoverage::point(self.window.position(i), value as u32);
            if mode == TrackMode::Full {
                coverage.breakdown = Some(BaseBreakdown {
                    a: self.bases[0][i],
                    c: self.bases[1][i],
                    g: self.bases[2][i],
                    t: self.bases[3][i],
                    n: self.bases[4][i],
                    del: del_depth.max(0) as u32,
                    ins: self.ins[i],
                });
            }
            out.push(coverage);
        }
        out
    }

    fn summarized(&self, scale_factor: f64) -> Vec<BaseCoverage> {
        let step = ((1.0 / scale_factor).round() as usize).max(1);
        let mut out = Vec::new();
        let mut depth = 0i64;
        let mut del_depth = 0i64;
        let mut bin_max = 0i64;
        let mut bin_start = 0usize;

        for i in 0..self.total.len() {
            depth += self.total[i] as i64;
            del_depth += self.del[i] as i64;
            bin_max = bin_max.max(depth - del_depth);

            let bin_full = i + 1 - bin_start == step;
            let last = i + 1 == self.total.len();
            if bin_full || last {
                if bin_max > 0 {
                    out.push(BaseCoverage {
                        start: self.window.position(bin_start),
                        end: self.window.position(i),
                        value: bin_max as u32,
                        breakdown: None,
                    });
                }
                bin_max = 0;
                bin_start = i + 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator(start: i64, end: i64) -> CoverageAccumulator {
        CoverageAccumulator::new(GenomicWindow::new(start, end).unwrap())
    }

    #[test]
    fn test_interval_is_clamped_to_window() {
        let mut acc = accumulator(10, 19);
        acc.add_interval(5, 12, DeltaTrack::Total, true);
        acc.add_interval(18, 40, DeltaTrack::Total, true);
        acc.add_interval(1, 9, DeltaTrack::Total, true);
        acc.add_interval(20, 25, DeltaTrack::Total, true);
        assert_eq!(acc.depths(), vec![1, 1, 1, 0, 0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_deletions_reduce_depth() {
        let mut acc = accumulator(1, 10);
        acc.add_interval(1, 10, DeltaTrack::Total, true);
        acc.add_interval(3, 10, DeltaTrack::Total, true);
        acc.add_interval(4, 5, DeltaTrack::Deletion, true);

        let coverage = acc.coverage(1.0, TrackMode::Full);
        let values: Vec<(i64, u32)> = coverage.iter().map(|c| (c.start, c.value)).collect();
        assert_eq!(
            values,
            vec![(1, 1), (2, 1), (3, 2), (4, 1), (5, 1), (6, 2), (7, 2), (8, 2), (9, 2), (10, 2)]
        );
        assert_eq!(coverage[3].breakdown.unwrap().del, 1);
        assert_eq!(coverage[5].breakdown.unwrap().del, 0);
    }

    #[test]
    fn test_zero_depth_positions_are_omitted() {
        let mut acc = accumulator(1, 10);
        acc.add_interval(3, 4, DeltaTrack::Total, true);
        acc.add_interval(8, 8, DeltaTrack::Total, true);
        let positions: Vec<i64> = acc
            .coverage(2.0, TrackMode::Summary)
            .iter()
            .map(|c| c.start)
            .collect();
        assert_eq!(positions, vec![3, 4, 8]);
        assert!(acc
            .coverage(1.0, TrackMode::Summary)
            .iter()
            .all(|c| c.breakdown.is_none()));
    }

    #[test]
    fn test_summary_reports_bin_maximum() {
        // Depths [3, 1, 1, 7, 2] over positions 1..=5
        let mut acc = accumulator(1, 5);
        for (start, end) in [(1, 5), (1, 5), (1, 1), (4, 4), (4, 4), (4, 4), (4, 4), (4, 4)] {
            acc.add_interval(start, end, DeltaTrack::Total, true);
        }
        acc.add_interval(2, 3, DeltaTrack::Total, false);
        assert_eq!(acc.depths(), vec![3, 1, 1, 7, 2]);

        let summary = acc.coverage(1.0 / 5.0, TrackMode::Summary);
        assert_eq!(
            summary,
            vec![BaseCoverage {
                start: 1,
                end: 5,
                value: 7,
                breakdown: None
            }]
        );
    }

    #[test]
    fn test_summary_bins_and_trailing_partial_bin() {
        let mut acc = accumulator(101, 110);
        acc.add_interval(102, 102, DeltaTrack::Total, true);
        acc.add_interval(109, 110, DeltaTrack::Total, true);
        acc.add_interval(110, 110, DeltaTrack::Total, true);

        let summary = acc.coverage(0.25, TrackMode::Summary);
        let bins: Vec<(i64, i64, u32)> = summary.iter().map(|c| (c.start, c.end, c.value)).collect();
        // Bins of 4: [101-104] [105-108] (empty, omitted) [109-110]
        assert_eq!(bins, vec![(101, 104, 1), (109, 110, 2)]);
    }

    #[test]
    fn test_full_mode_ignores_scale() {
        let mut acc = accumulator(1, 4);
        acc.add_interval(1, 4, DeltaTrack::Total, true);
        acc.add_base(2, b'G');
        acc.add_base(2, b'G');
        acc.add_base(3, b'N');
        acc.add_base(3, b'*');
        acc.add_insertion(4);
        acc.add_insertion(40);

        let coverage = acc.coverage(0.1, TrackMode::Full);
        assert_eq!(coverage.len(), 4);
        assert_eq!(
            coverage[1].breakdown,
            Some(BaseBreakdown {
                g: 2,
                ..Default::default()
            })
        );
        assert_eq!(coverage[2].breakdown.unwrap().n, 1);
        assert_eq!(coverage[3].breakdown.unwrap().ins, 1);
    }
}
