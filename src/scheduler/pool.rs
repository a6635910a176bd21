//! Bounded worker pool running dataset parts in parallel.
//!
//! Overview
//! - Parts are pushed onto a bounded job channel up front; scoped worker
//!   threads drain it, fit every ROI stack of their part and send one
//!   [`PartOutput`] back. The coordinator multiplexes the result and
//!   progress channels until every part has reported.
//! - Workers share the frame source and ROI list read-only, so the scope
//!   borrows them directly with no locking.

use crossbeam_channel::{bounded, unbounded, select};
use log::debug;

use crate::fit::{FitEngine, PartContext};
use crate::image::RoiWindow;
use crate::source::FrameSource;
use crate::types::{ResultRecord, Roi};

use super::parts::DatasetPart;

/// Fit results of one part: one entry per ROI, in ROI order. `None` marks an
/// ROI whose window left the frame somewhere in this part.
#[derive(Debug)]
pub struct PartOutput {
    pub part_index: usize,
    pub start_frame: usize,
    pub results: Vec<Option<Vec<ResultRecord>>>,
}

/// One completed ROI stack, reported for progress accounting.
struct ProgressEvent {
    part_index: usize,
    roi_index: usize,
}

/// Run all `parts` over `worker_count` threads and return their outputs
/// sorted by part index.
pub fn run_parts(
    source: &dyn FrameSource,
    rois: &[Roi],
    parts: &[DatasetPart],
    engine: &dyn FitEngine,
    half: usize,
    worker_count: usize,
) -> Vec<PartOutput> {
    let (job_tx, job_rx) = bounded::<DatasetPart>(parts.len().max(1));
    for part in parts {
        // Capacity equals the part count, so this never blocks.
        let _ = job_tx.send(part.clone());
    }
    drop(job_tx);

    let (result_tx, result_rx) = bounded::<PartOutput>(parts.len().max(1));
    let (progress_tx, progress_rx) = unbounded::<ProgressEvent>();

    let mut outputs = Vec::with_capacity(parts.len());
    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let progress_tx = progress_tx.clone();
            scope.spawn(move || {
                for part in job_rx.iter() {
                    let output = process_part(source, rois, &part, engine, half, &progress_tx);
                    if result_tx.send(output).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);
        drop(progress_tx);

        let total = parts.len() * rois.len();
        let mut done = 0usize;
        while outputs.len() < parts.len() {
            select! {
                recv(progress_rx) -> event => {
                    if let Ok(event) = event {
                        done += 1;
                        debug!(
                            "part {} roi {} done ({done}/{total})",
                            event.part_index, event.roi_index
                        );
                    }
                }
                recv(result_rx) -> output => {
                    match output {
                        Ok(output) => outputs.push(output),
                        Err(_) => break,
                    }
                }
            }
        }
        for event in progress_rx.try_iter() {
            done += 1;
            debug!(
                "part {} roi {} done ({done}/{total})",
                event.part_index, event.roi_index
            );
        }
    });

    outputs.sort_by_key(|o| o.part_index);
    outputs
}

/// Fit every ROI stack of one part.
fn process_part(
    source: &dyn FrameSource,
    rois: &[Roi],
    part: &DatasetPart,
    engine: &dyn FitEngine,
    half: usize,
    progress_tx: &crossbeam_channel::Sender<ProgressEvent>,
) -> PartOutput {
    let ctx = PartContext {
        start_frame: part.range.start,
        offset_from_base: part.offset_from_base,
    };
    let (width, height) = (source.width(), source.height());

    let mut results = Vec::with_capacity(rois.len());
    for roi in rois {
        let stack = if roi.in_frame(width, height, half, part.offset_from_base) {
            crop_stack(source, roi, part, half).map(|windows| engine.fit_stack(&windows, roi, &ctx))
        } else {
            None
        };
        results.push(stack);
        let _ = progress_tx.send(ProgressEvent {
            part_index: part.index,
            roi_index: roi.index,
        });
    }

    PartOutput {
        part_index: part.index,
        start_frame: part.range.start,
        results,
    }
}

/// Crop the per-frame windows of one ROI over the part's range, or `None`
/// when the drift-adjusted window does not fit the frame.
fn crop_stack(
    source: &dyn FrameSource,
    roi: &Roi,
    part: &DatasetPart,
    half: usize,
) -> Option<Vec<RoiWindow>> {
    let (cy, cx) = roi.window_center(part.offset_from_base);
    let mut windows = Vec::with_capacity(part.range.len());
    for frame_index in part.range.clone() {
        let frame = source.frame(frame_index);
        windows.push(RoiWindow::from_frame(&frame, cy, cx, half)?);
    }
    Some(windows)
}
