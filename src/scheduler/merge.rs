//! Merging per-part outputs into whole-run trajectories.

use std::ops::Range;

use crate::types::{FitMethod, ResultRecord, Roi, Trajectory, TrajectorySet};

use super::parts::DatasetPart;
use super::pool::PartOutput;

/// Stitch part outputs (sorted by part index) into one trajectory per ROI.
///
/// Every trajectory spans the full requested range: an ROI whose window left
/// the frame in some part is NaN-filled from that part onward and not
/// resumed, so a trajectory never silently changes emitters mid-run.
pub fn merge_outputs(
    outputs: &[PartOutput],
    parts: &[DatasetPart],
    rois: &[Roi],
    method: FitMethod,
    range: Range<usize>,
) -> TrajectorySet {
    let n_frames = range.len();
    let mut trajectories = Vec::with_capacity(rois.len());

    for (roi_pos, roi) in rois.iter().enumerate() {
        let mut records = Vec::with_capacity(n_frames);
        let mut lost = false;
        for (output, part) in outputs.iter().zip(parts) {
            match output.results.get(roi_pos).and_then(Option::as_ref) {
                Some(part_records) if !lost => records.extend_from_slice(part_records),
                _ => {
                    lost = true;
                    records.extend(part.range.clone().map(ResultRecord::nan));
                }
            }
        }
        debug_assert_eq!(records.len(), n_frames);
        trajectories.push(Trajectory {
            roi_index: roi.index,
            records,
        });
    }

    TrajectorySet {
        method,
        start_frame: range.start,
        n_frames,
        trajectories,
    }
}
