//! Dataset scheduler: partitioning, drift anchoring, the worker pool and the
//! final merge behind one entry point.
//!
//! Overview
//! - [`parts`] plans the partition of the requested frame range under the
//!   memory budget, worker count and correlation interval.
//! - [`pool`] runs the parts over scoped worker threads.
//! - [`merge`] stitches the per-part outputs back into full-length
//!   per-ROI trajectories.
//! - [`DatasetScheduler`] wires them together with the drift correlator and
//!   the engine selection, and is what the binary and tests call.

pub mod merge;
pub mod parts;
pub mod pool;

use log::{info, warn};

use crate::correlate::anchor_parts;
use crate::fit::calibrate::calibrate_max_iterations;
use crate::fit::{make_engine, DEFAULT_INIT_SIGMA};
use crate::settings::{FitSettings, OutputUnits, SettingsError};
use crate::source::FrameSource;
use crate::types::{Roi, TrajectorySet};

pub use merge::merge_outputs;
pub use parts::{plan_parts, DatasetPart, SplitParams};
pub use pool::{run_parts, PartOutput};

/// Fit counters of one run.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct RunSummary {
    pub total_fits: usize,
    pub successful_fits: usize,
    pub failed_fits: usize,
}

/// Everything a run produces.
#[derive(Clone, Debug)]
pub struct FitOutput {
    pub trajectories: TrajectorySet,
    pub summary: RunSummary,
}

/// Orchestrates one fitting run over a frame source.
pub struct DatasetScheduler {
    settings: FitSettings,
}

impl DatasetScheduler {
    pub fn new(settings: FitSettings) -> Self {
        Self { settings }
    }

    /// Fit `rois` over the configured frame range of `source`.
    pub fn run(
        &self,
        source: &dyn FrameSource,
        rois: &[Roi],
    ) -> Result<FitOutput, SettingsError> {
        let settings = &self.settings;
        let range = settings.resolve_range(source.len())?;

        // The phasor math is cheap enough that thread fan-out costs more than
        // it saves, and single-threaded runs are bitwise reproducible.
        let worker_count = if settings.method.is_gaussian() {
            settings.worker_count
        } else {
            if settings.worker_count > 1 {
                warn!(
                    "phasor methods run single-threaded, ignoring worker_count {}",
                    settings.worker_count
                );
            }
            1
        };

        let bytes_per_frame = source.width() * source.height() * 2;
        let max_frames_in_memory = (settings.memory_budget_bytes / bytes_per_frame.max(1)).max(1);
        let mut parts = plan_parts(
            range.clone(),
            &SplitParams {
                max_frames_in_memory,
                worker_count,
                correlation_interval: settings.correlation_interval,
            },
        );
        info!(
            "fitting {} rois over frames {}..{} in {} part(s) on {} worker(s)",
            rois.len(),
            range.start,
            range.end,
            parts.len(),
            worker_count
        );
        if parts.len() > 1 {
            anchor_parts(source, &mut parts, settings.roi_size);
        }

        let metadata = source.metadata();
        let init_sigma = metadata
            .diffraction_sigma_px()
            .unwrap_or(DEFAULT_INIT_SIGMA);
        let max_iterations = if settings.method.is_gaussian() {
            calibrate_max_iterations(
                &source.frame(range.start),
                rois,
                settings.roi_size,
                init_sigma,
            )
        } else {
            0
        };

        let engine = make_engine(settings, max_iterations, init_sigma);
        let outputs = run_parts(
            source,
            rois,
            &parts,
            engine.as_ref(),
            settings.half(),
            worker_count,
        );
        let mut trajectories =
            merge_outputs(&outputs, &parts, rois, settings.method, range);

        if settings.output_units == OutputUnits::Nm {
            trajectories.to_physical_units(metadata.pixel_size_um);
        }

        let total_fits = trajectories.trajectories.len() * trajectories.n_frames;
        let successful_fits = trajectories
            .trajectories
            .iter()
            .flat_map(|t| &t.records)
            .filter(|r| r.is_success())
            .count();
        let summary = RunSummary {
            total_fits,
            successful_fits,
            failed_fits: total_fits - successful_fits,
        };
        info!(
            "run finished: {}/{} fits succeeded",
            summary.successful_fits, summary.total_fits
        );

        Ok(FitOutput {
            trajectories,
            summary,
        })
    }
}
