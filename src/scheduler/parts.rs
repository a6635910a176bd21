//! Dataset partitioning under memory and worker constraints.
//!
//! Overview
//! - A part is a contiguous frame range one worker fits in one go. Parts are
//!   shaped by three forces: the memory budget (workers hold their part's
//!   frames resident simultaneously), the worker count (enough parts to keep
//!   every worker busy), and the optional correlation interval (drift is
//!   re-anchored at part boundaries, so the user can pin part length).
//! - The `correlate` flag marks parts whose first frame participates in
//!   inter-part drift correlation. Sub-parts produced purely for
//!   parallelism keep the flag only on their first piece, so splitting for
//!   cores never changes where drift is measured.

use std::ops::Range;

use nalgebra::Vector2;

/// One contiguous schedulable slice of the frame range.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetPart {
    pub index: usize,
    pub range: Range<usize>,
    /// Whether the drift correlator anchors at this part's first frame.
    pub correlate: bool,
    /// Filled in by the correlator before fitting starts.
    pub offset_from_base: Vector2<f64>,
}

impl DatasetPart {
    fn new(range: Range<usize>, correlate: bool) -> Self {
        Self {
            index: 0,
            range,
            correlate,
            offset_from_base: Vector2::zeros(),
        }
    }
}

/// Constraints the planner balances.
#[derive(Clone, Copy, Debug)]
pub struct SplitParams {
    /// How many frames fit in the memory budget at once.
    pub max_frames_in_memory: usize,
    pub worker_count: usize,
    pub correlation_interval: Option<usize>,
}

/// Partition `range` into parts satisfying `params`.
///
/// The parts always tile `range` exactly, in order, with no empty part.
pub fn plan_parts(range: Range<usize>, params: &SplitParams) -> Vec<DatasetPart> {
    let len = range.len();
    let fits_in_memory = len <= params.max_frames_in_memory;

    let mut parts = match (fits_in_memory, params.correlation_interval) {
        (false, Some(interval)) => {
            // Fixed-length parts at the requested interval, then halve until
            // all concurrently-resident parts respect the budget.
            let mut parts = split_fixed(range, interval);
            loop {
                let longest = parts.iter().map(|p| p.range.len()).max().unwrap_or(0);
                if longest * params.worker_count <= params.max_frames_in_memory || longest <= 1 {
                    break;
                }
                parts = parts.into_iter().flat_map(split_in_two).collect();
            }
            parts
        }
        (false, None) => {
            // Just enough even parts to fit, then fan each out over the
            // workers.
            let n = len / params.max_frames_in_memory + 1;
            split_even(range, n, true)
                .into_iter()
                .flat_map(|p| fan_out(p, params.worker_count))
                .collect()
        }
        (true, Some(interval)) => {
            // Part length is pinned by the interval; split in two only when
            // there are too few parts to occupy the workers.
            let mut parts = split_fixed(range, interval);
            while parts.len() < params.worker_count {
                let before = parts.len();
                parts = parts.into_iter().flat_map(split_in_two).collect();
                if parts.len() == before {
                    break;
                }
            }
            parts
        }
        (true, None) if params.worker_count > 1 => split_even(range, params.worker_count, true),
        (true, None) => vec![DatasetPart::new(range, true)],
    };

    for (i, part) in parts.iter_mut().enumerate() {
        part.index = i;
    }
    parts
}

/// Even split into at most `n` non-empty parts; the remainder goes to the
/// earliest parts.
fn split_even(range: Range<usize>, n: usize, correlate: bool) -> Vec<DatasetPart> {
    let len = range.len();
    let n = n.min(len).max(1);
    let base = len / n;
    let remainder = len % n;
    let mut parts = Vec::with_capacity(n);
    let mut begin = range.start;
    for i in 0..n {
        let part_len = base + usize::from(i < remainder);
        parts.push(DatasetPart::new(begin..begin + part_len, correlate));
        begin += part_len;
    }
    parts
}

/// Fixed-length parts of `interval` frames; the last part takes the
/// remainder. Every boundary is a correlation anchor.
fn split_fixed(range: Range<usize>, interval: usize) -> Vec<DatasetPart> {
    let mut parts = Vec::new();
    let mut begin = range.start;
    while begin < range.end {
        let end = (begin + interval).min(range.end);
        parts.push(DatasetPart::new(begin..end, true));
        begin = end;
    }
    parts
}

/// Split one part in two halves; only the first inherits the correlation
/// flag, so the anchor stays at the original boundary. Length-1 parts pass
/// through unchanged.
fn split_in_two(part: DatasetPart) -> Vec<DatasetPart> {
    let len = part.range.len();
    if len <= 1 {
        return vec![part];
    }
    let mid = part.range.start + len.div_ceil(2);
    vec![
        DatasetPart::new(part.range.start..mid, part.correlate),
        DatasetPart::new(mid..part.range.end, false),
    ]
}

/// Split one part across `workers` pieces for parallelism; only the first
/// inherits the correlation flag.
fn fan_out(part: DatasetPart, workers: usize) -> Vec<DatasetPart> {
    let mut pieces = split_even(part.range.clone(), workers, false);
    if let Some(first) = pieces.first_mut() {
        first.correlate = part.correlate;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(parts: &[DatasetPart], range: Range<usize>) {
        assert!(!parts.is_empty());
        assert_eq!(parts[0].range.start, range.start);
        assert_eq!(parts.last().map(|p| p.range.end), Some(range.end));
        for pair in parts.windows(2) {
            assert_eq!(pair[0].range.end, pair[1].range.start);
            assert!(!pair[0].range.is_empty());
        }
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.index, i);
            assert!(!part.range.is_empty());
        }
    }

    #[test]
    fn small_single_worker_dataset_is_one_part() {
        let params = SplitParams {
            max_frames_in_memory: 1000,
            worker_count: 1,
            correlation_interval: None,
        };
        let parts = plan_parts(0..100, &params);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].range, 0..100);
        assert!(parts[0].correlate);
    }

    #[test]
    fn multi_worker_split_is_even_with_remainder_first() {
        let params = SplitParams {
            max_frames_in_memory: 1000,
            worker_count: 3,
            correlation_interval: None,
        };
        let parts = plan_parts(0..100, &params);
        assert_tiles(&parts, 0..100);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].range, 0..34);
        assert_eq!(parts[1].range, 34..67);
        assert_eq!(parts[2].range, 67..100);
        assert!(parts.iter().all(|p| p.correlate));
    }

    #[test]
    fn interval_pins_part_boundaries() {
        let params = SplitParams {
            max_frames_in_memory: 1000,
            worker_count: 1,
            correlation_interval: Some(30),
        };
        let parts = plan_parts(0..100, &params);
        assert_tiles(&parts, 0..100);
        let lens: Vec<usize> = parts.iter().map(|p| p.range.len()).collect();
        assert_eq!(lens, vec![30, 30, 30, 10]);
        assert!(parts.iter().all(|p| p.correlate));
    }

    #[test]
    fn interval_parts_halve_until_workers_are_busy() {
        let params = SplitParams {
            max_frames_in_memory: 1000,
            worker_count: 4,
            correlation_interval: Some(50),
        };
        let parts = plan_parts(0..100, &params);
        assert_tiles(&parts, 0..100);
        assert_eq!(parts.len(), 4);
        // Anchors stay where the interval put them.
        let anchors: Vec<bool> = parts.iter().map(|p| p.correlate).collect();
        assert_eq!(anchors, vec![true, false, true, false]);
    }

    #[test]
    fn memory_budget_forces_more_parts() {
        let params = SplitParams {
            max_frames_in_memory: 40,
            worker_count: 2,
            correlation_interval: None,
        };
        let parts = plan_parts(0..100, &params);
        assert_tiles(&parts, 0..100);
        // Every concurrently-resident pair of parts respects the budget.
        for part in &parts {
            assert!(part.range.len() * params.worker_count <= 2 * params.max_frames_in_memory);
        }
        // Fanned-out sub-parts carry the anchor only on their first piece.
        assert!(parts[0].correlate);
        assert!(!parts[1].correlate);
    }

    #[test]
    fn over_memory_interval_parts_respect_the_budget() {
        let params = SplitParams {
            max_frames_in_memory: 60,
            worker_count: 2,
            correlation_interval: Some(100),
        };
        let parts = plan_parts(0..400, &params);
        assert_tiles(&parts, 0..400);
        for part in &parts {
            assert!(part.range.len() * params.worker_count <= params.max_frames_in_memory);
        }
        // The interval anchors survive the halving.
        for anchor in [0usize, 100, 200, 300] {
            assert!(parts
                .iter()
                .any(|p| p.range.start == anchor && p.correlate));
        }
    }
}
