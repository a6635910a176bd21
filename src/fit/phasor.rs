//! Phasor localization: sub-pixel position from first-harmonic phases.
//!
//! Overview
//! - The window is treated as one period of a discrete signal per axis; the
//!   phase of the first Fourier coefficient encodes the centre of mass of
//!   the peak. A pure single-pixel peak at index `k` maps back to exactly
//!   `k`, and a constant background contributes nothing to the first
//!   harmonic, so no background subtraction is needed.
//! - Three variants share the position and differ only in the photometry
//!   columns they add: none, `max − border background`, or the plain window
//!   sum.

use num_complex::Complex64;

use crate::image::RoiWindow;
use crate::types::{FitMethod, ResultRecord, Roi};

use super::{absolute_position, FitEngine, PartContext};

/// First-harmonic Fourier coefficients along x and y.
///
/// `fx` sums rows against `exp(-2πi·x/n)`, `fy` columns against
/// `exp(-2πi·y/n)`; both are plain O(n²) sums since n is 7 or 9.
pub fn first_harmonics(window: &RoiWindow) -> (Complex64, Complex64) {
    let n = window.size();
    let step = -2.0 * std::f64::consts::PI / n as f64;
    let mut fx = Complex64::new(0.0, 0.0);
    let mut fy = Complex64::new(0.0, 0.0);
    for y in 0..n {
        let wy = Complex64::from_polar(1.0, step * y as f64);
        for x in 0..n {
            let v = window.get(y, x);
            fx += v * Complex64::from_polar(1.0, step * x as f64);
            fy += v * wy;
        }
    }
    (fx, fy)
}

/// Convert a first-harmonic phase to a continuous 0-based pixel index.
///
/// The phase of a peak at index `k` is `-2πk/n`; `atan2` folds indices past
/// the window midpoint into positive angles, which are unwrapped by a full
/// turn before scaling.
#[inline]
fn phase_to_position(coeff: Complex64, n: usize) -> f64 {
    let mut angle = coeff.im.atan2(coeff.re);
    if angle > 0.0 {
        angle -= 2.0 * std::f64::consts::PI;
    }
    -angle * n as f64 / (2.0 * std::f64::consts::PI)
}

/// Window-local `(y, x)` position of the dominant peak.
pub fn phasor_position(window: &RoiWindow) -> (f64, f64) {
    let (fx, fy) = first_harmonics(window);
    let n = window.size();
    (phase_to_position(fy, n), phase_to_position(fx, n))
}

/// The three phasor-based methods behind one engine.
pub struct PhasorEngine {
    method: FitMethod,
    roi_size: usize,
    rejection: bool,
}

impl PhasorEngine {
    pub fn new(method: FitMethod, roi_size: usize, rejection: bool) -> Self {
        debug_assert!(!method.is_gaussian());
        Self {
            method,
            roi_size,
            rejection,
        }
    }

    fn fit_one(&self, window: &RoiWindow, frame: usize, roi: &Roi, ctx: &PartContext) -> ResultRecord {
        // Empty windows carry no signal to localize; the photometric variants
        // reject them outright.
        match self.method {
            FitMethod::PhasorIntensity if window.max() == 0.0 => return ResultRecord::nan(frame),
            FitMethod::PhasorSum if window.sum() == 0.0 => return ResultRecord::nan(frame),
            _ => {}
        }

        let (ly, lx) = phasor_position(window);
        let in_window = |p: f64| (0.0..=self.roi_size as f64).contains(&p);
        if self.rejection && (!in_window(ly) || !in_window(lx)) {
            return ResultRecord::nan(frame);
        }

        let half = (self.roi_size - 1) / 2;
        let mut record = ResultRecord::nan(frame);
        record.y = absolute_position(ly, roi.y, half, ctx.offset_from_base[0]);
        record.x = absolute_position(lx, roi.x, half, ctx.offset_from_base[1]);
        match self.method {
            FitMethod::PhasorIntensity => {
                let background = window.edge_background();
                record.intensity = window.max() - background;
                record.background = background;
            }
            FitMethod::PhasorSum => record.intensity = window.sum(),
            _ => {}
        }
        record
    }
}

impl FitEngine for PhasorEngine {
    fn fit_stack(&self, windows: &[RoiWindow], roi: &Roi, ctx: &PartContext) -> Vec<ResultRecord> {
        windows
            .iter()
            .enumerate()
            .map(|(i, window)| self.fit_one(window, ctx.start_frame + i, roi, ctx))
            .collect()
    }

    fn method(&self) -> FitMethod {
        self.method
    }
}
