use bamtrack::coverage::{CoverageAccumulator, DeltaTrack};
use bamtrack::options::TrackMode;
use bamtrack::window::GenomicWindow;
use proptest::prelude::*;

const WINDOW_START: i64 = 10;
const WINDOW_END: i64 = 40;

fn interval() -> impl Strategy<Value = (i64, i64)> {
    (1i64..60, 0i64..15).prop_map(|(start, len)| (start, start + len))
}

fn brute_force(reads: &[(i64, i64)], deletions: &[(i64, i64)]) -> Vec<u32> {
    (WINDOW_START..=WINDOW_END)
        .map(|pos| {
            let covered = reads.iter().filter(|&&(s, e)| s <= pos && pos <= e).count() as i64;
            let deleted = deletions.iter().filter(|&&(s, e)| s <= pos && pos <= e).count() as i64;
            (covered - deleted).max(0) as u32
        })
        .collect()
}

proptest! {
    #[test]
    fn delta_arrays_match_per_base_counting(
        reads in prop::collection::vec(interval(), 0..40),
        deletions in prop::collection::vec(interval(), 0..10),
    ) {
        let window = GenomicWindow::new(WINDOW_START, WINDOW_END).unwrap();
        let mut acc = CoverageAccumulator::new(window);
        for &(start, end) in &reads {
            acc.add_interval(start, end, DeltaTrack::Total, true);
        }
        for &(start, end) in &deletions {
            acc.add_interval(start, end, DeltaTrack::Deletion, true);
        }
        prop_assert_eq!(acc.depths(), brute_force(&reads, &deletions));
    }

    #[test]
    fn summary_bins_report_the_maximum(
        reads in prop::collection::vec(interval(), 1..40),
        bin in 1usize..12,
    ) {
        let window = GenomicWindow::new(WINDOW_START, WINDOW_END).unwrap();
        let mut acc = CoverageAccumulator::new(window);
        for &(start, end) in &reads {
            acc.add_interval(start, end, DeltaTrack::Total, true);
        }
        let depths = brute_force(&reads, &[]);
        let expected: Vec<(i64, i64, u32)> = depths
            .chunks(bin)
            .enumerate()
            .filter_map(|(i, chunk)| {
                let max = chunk.iter().copied().max().unwrap_or(0);
                let start = WINDOW_START + (i * bin) as i64;
                (max > 0).then_some((start, start + chunk.len() as i64 - 1, max))
            })
            .collect();

        let scale = 1.0 / bin as f64;
        let summary: Vec<(i64, i64, u32)> = acc
            .coverage(scale, TrackMode::Summary)
            .iter()
            .map(|c| (c.start, c.end, c.value))
            .collect();
        // A bin of one base is the per-base output
        prop_assert_eq!(summary, expected);
    }
}
