//! Ensemble drift correction of merged trajectories.
//!
//! Overview
//! - Every immobilized emitter sees the same stage drift, so the per-frame
//!   ensemble mean of position displacements (relative to each trajectory's
//!   first frame) is the drift curve, and subtracting it sharpens all
//!   trajectories at once.
//! - For the Gaussian methods each trajectory first drops its abnormally
//!   bright localizations (sigma-clipped intensity cutoff, fitted per ROI so
//!   a bright neighbor cannot mask a dim emitter's outliers): overlapping
//!   emitters and aggregates would otherwise drag the mean around. Excluded
//!   frames come back as NaN rows in the corrected output.

use log::debug;
use nalgebra::Vector2;

use crate::stats::clipped_cutoff;
use crate::types::{FitMethod, ResultRecord, TrajectorySet};

const CLIP_ITERATIONS: usize = 10;

/// Drift curve plus the corrected trajectories.
#[derive(Clone, Debug)]
pub struct DriftResult {
    pub corrected: TrajectorySet,
    /// Per-frame `[dy, dx]` drift in the trajectory's units, zero-based at
    /// the first frame. NaN on frames where no trajectory contributed.
    pub drift: Vec<Vector2<f64>>,
}

pub struct DriftCorrector {
    method: FitMethod,
    /// `k` of the intensity sigma-clipping cutoff.
    threshold_sigma: f64,
}

impl DriftCorrector {
    pub fn new(method: FitMethod) -> Self {
        Self {
            method,
            threshold_sigma: 5.0,
        }
    }

    /// Per-trajectory mask of intensity outliers, all-false for the phasor
    /// methods and for trajectories with no finite intensities.
    fn outlier_masks(&self, set: &TrajectorySet) -> Vec<Vec<bool>> {
        set.trajectories
            .iter()
            .map(|trajectory| {
                if !self.method.is_gaussian() {
                    return vec![false; trajectory.records.len()];
                }
                let intensities: Vec<f64> = trajectory
                    .records
                    .iter()
                    .map(|r| r.intensity)
                    .filter(|v| v.is_finite())
                    .collect();
                let Some(cutoff) =
                    clipped_cutoff(&intensities, self.threshold_sigma, CLIP_ITERATIONS)
                else {
                    return vec![false; trajectory.records.len()];
                };
                debug!(
                    "roi {}: intensity cutoff for drift estimation {cutoff:.1}",
                    trajectory.roi_index
                );
                trajectory
                    .records
                    .iter()
                    .map(|r| r.intensity > cutoff)
                    .collect()
            })
            .collect()
    }

    /// Estimate the common drift of `set` and subtract it.
    pub fn correct(&self, set: &TrajectorySet) -> DriftResult {
        let n_frames = set.n_frames;
        let masks = self.outlier_masks(set);

        // Per-frame displacement sums over trajectories with a usable first
        // frame.
        let mut sums = vec![Vector2::zeros(); n_frames];
        let mut counts = vec![0usize; n_frames];
        for (trajectory, mask) in set.trajectories.iter().zip(&masks) {
            let Some(base) = trajectory.records.first() else {
                continue;
            };
            if !base.is_success() || mask[0] {
                continue;
            }
            let (base_y, base_x) = (base.y, base.x);
            for (i, record) in trajectory.records.iter().enumerate() {
                if !record.is_success() || mask[i] {
                    continue;
                }
                sums[i] += Vector2::new(record.y - base_y, record.x - base_x);
                counts[i] += 1;
            }
        }

        let drift: Vec<Vector2<f64>> = sums
            .into_iter()
            .zip(&counts)
            .map(|(sum, &count)| {
                if count > 0 {
                    sum / count as f64
                } else {
                    Vector2::new(f64::NAN, f64::NAN)
                }
            })
            .collect();

        let mut corrected = set.clone();
        for (trajectory, mask) in corrected.trajectories.iter_mut().zip(&masks) {
            for (i, record) in trajectory.records.iter_mut().enumerate() {
                if mask[i] {
                    *record = ResultRecord::nan(record.frame);
                } else {
                    record.y -= drift[i][0];
                    record.x -= drift[i][1];
                }
            }
        }

        DriftResult { corrected, drift }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trajectory;

    fn drifting_set(n_frames: usize, bases: &[(f64, f64)], step: (f64, f64)) -> TrajectorySet {
        let trajectories = bases
            .iter()
            .enumerate()
            .map(|(roi_index, &(by, bx))| Trajectory {
                roi_index,
                records: (0..n_frames)
                    .map(|frame| {
                        let mut r = ResultRecord::nan(frame);
                        r.y = by + step.0 * frame as f64;
                        r.x = bx + step.1 * frame as f64;
                        r.intensity = 1000.0;
                        r
                    })
                    .collect(),
            })
            .collect();
        TrajectorySet {
            method: FitMethod::GaussianEstimateBg,
            start_frame: 0,
            n_frames,
            trajectories,
        }
    }

    #[test]
    fn linear_drift_is_removed_exactly() {
        let set = drifting_set(20, &[(10.5, 12.5), (30.25, 8.75), (21.0, 40.0)], (0.05, -0.02));
        let result = DriftCorrector::new(set.method).correct(&set);

        for (frame, drift) in result.drift.iter().enumerate() {
            assert!((drift[0] - 0.05 * frame as f64).abs() < 1e-12);
            assert!((drift[1] + 0.02 * frame as f64).abs() < 1e-12);
        }
        for trajectory in &result.corrected.trajectories {
            let first = &trajectory.records[0];
            for record in &trajectory.records {
                assert!((record.y - first.y).abs() < 1e-12);
                assert!((record.x - first.x).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn bright_outlier_does_not_bend_the_estimate() {
        let mut set = drifting_set(40, &[(10.0, 10.0), (20.0, 20.0)], (0.1, 0.0));
        // One aggregate-like localization, far off and very bright.
        set.trajectories[1].records[5].y = 500.0;
        set.trajectories[1].records[5].intensity = 1e6;
        let result = DriftCorrector::new(set.method).correct(&set);
        assert!((result.drift[5][0] - 0.5).abs() < 1e-9);
        // The excluded frame turns into an explicit NaN row.
        assert!(!result.corrected.trajectories[1].records[5].is_success());
    }

    #[test]
    fn outlier_cutoff_is_fitted_per_roi() {
        // A bright neighbor must not lift the cutoff above a dim emitter's
        // own outliers.
        let mut set = drifting_set(40, &[(10.0, 10.0), (20.0, 20.0)], (0.0, 0.0));
        for record in &mut set.trajectories[0].records {
            record.intensity = 10_000.0;
        }
        for record in &mut set.trajectories[1].records {
            record.intensity = 100.0;
        }
        set.trajectories[1].records[5].y = 70.0;
        set.trajectories[1].records[5].intensity = 3000.0;

        let result = DriftCorrector::new(set.method).correct(&set);
        assert!(result.drift[5][0].abs() < 1e-9, "drift={}", result.drift[5][0]);
        assert!(!result.corrected.trajectories[1].records[5].is_success());
    }

    #[test]
    fn nan_records_are_ignored() {
        let mut set = drifting_set(6, &[(10.0, 10.0), (20.0, 20.0)], (0.0, 0.0));
        set.trajectories[0].records[3] = ResultRecord::nan(3);
        let result = DriftCorrector::new(set.method).correct(&set);
        assert_eq!(result.drift[3], Vector2::zeros());
        // The corrected copy keeps the NaN row.
        assert!(!result.corrected.trajectories[0].records[3].is_success());
    }

    #[test]
    fn frame_with_no_usable_fits_reports_nan_drift() {
        let mut set = drifting_set(6, &[(10.0, 10.0), (20.0, 20.0)], (0.0, 0.0));
        set.trajectories[0].records[2] = ResultRecord::nan(2);
        set.trajectories[1].records[2] = ResultRecord::nan(2);
        let result = DriftCorrector::new(set.method).correct(&set);
        assert!(result.drift[2][0].is_nan() && result.drift[2][1].is_nan());
        assert_eq!(result.drift[3], Vector2::zeros());
    }
}
