//! Iteration-cap calibration for the Gaussian methods.
//!
//! Dim emitters need more solver iterations than bright ones. Instead of
//! paying the worst case on every frame, a single calibration pass fits the
//! first frame of each ROI with a generous cap, models the resulting
//! amplitude distribution, and derives a production cap from its lower tail.

use log::{debug, warn};
use nalgebra::Vector2;

use crate::image::{FrameU16, RoiWindow};
use crate::stats::fit_normal;
use crate::types::Roi;

use super::gaussian::GaussianEngine;
use super::{FitEngine, PartContext};

/// Cap used during the calibration pass itself, and the fallback when the
/// pass yields no usable fits.
pub const CALIBRATION_ITERATIONS: usize = 400;

/// Fitted amplitude above which the minimum cap is already sufficient.
const BRIGHT_AMPLITUDE: f64 = 3000.0;

/// Derive the production iteration cap from fits of `frame`.
pub fn calibrate_max_iterations(
    frame: &FrameU16<'_>,
    rois: &[Roi],
    roi_size: usize,
    init_sigma: f64,
) -> usize {
    let half = (roi_size - 1) / 2;
    let engine = GaussianEngine::new(roi_size, true, false, init_sigma, CALIBRATION_ITERATIONS);
    let ctx = PartContext {
        start_frame: 0,
        offset_from_base: Vector2::zeros(),
    };

    let mut amplitudes = Vec::with_capacity(rois.len());
    for roi in rois {
        let Some(window) = RoiWindow::from_frame(frame, roi.y as isize, roi.x as isize, half)
        else {
            continue;
        };
        let records = engine.fit_stack(std::slice::from_ref(&window), roi, &ctx);
        if let Some(record) = records.first() {
            // The record carries the integrated surface; the cap formula is
            // calibrated on the peak amplitude.
            let amplitude =
                record.intensity / (record.sigma_y * record.sigma_x * 2.0 * std::f64::consts::PI);
            if record.is_success() && amplitude.is_finite() && amplitude > 0.0 {
                amplitudes.push(amplitude);
            }
        }
    }

    let Some((mean, _)) = fit_normal(&amplitudes) else {
        warn!("calibration produced no usable fits, keeping the {CALIBRATION_ITERATIONS}-iteration cap");
        return CALIBRATION_ITERATIONS;
    };
    // Refit below the first mean to bias toward the dim population, which is
    // the one that actually needs the iterations.
    let dim: Vec<f64> = amplitudes.iter().copied().filter(|v| *v < mean).collect();
    let mean = fit_normal(&dim).map_or(mean, |(m, _)| m);

    let cap = if mean >= BRIGHT_AMPLITUDE {
        100
    } else {
        ((BRIGHT_AMPLITUDE - mean) / 1000.0).ceil() as usize * 100 + 100
    };
    let cap = cap.min(CALIBRATION_ITERATIONS);
    debug!(
        "calibrated iteration cap {cap} from {} fits (dim-population amplitude {mean:.0})",
        amplitudes.len()
    );
    cap
}
