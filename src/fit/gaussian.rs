//! Symmetric-axis 2D Gaussian fits of single emitters.
//!
//! Overview
//! - A per-frame window is modelled as
//!   `A·exp(-(y-y0)²/2σy² - (x-x0)²/2σx²) [+ b]` and refined with the damped
//!   least-squares solver in [`super::lm`], seeded by the phasor position.
//! - Two variants: the background is either pre-estimated from the window
//!   border and subtracted (5 free parameters), or fitted as a sixth one.
//! - Converged sigmas warm-start the next frame of the same ROI; a failed
//!   frame resets the warm start so one bad frame cannot poison the rest of
//!   the stack.

use nalgebra::{DMatrix, DVector};

use crate::image::RoiWindow;
use crate::types::{FitMethod, ResultRecord, Roi};

use super::lm::{levenberg_marquardt, LmOptions};
use super::phasor::phasor_position;
use super::{absolute_position, FitEngine, PartContext};

/// Upper intensity bound for rejection, 1.5× the u16 full scale.
const MAX_AMPLITUDE: f64 = 1.5 * 65_535.0;
const MIN_SIGMA: f64 = 0.25;

pub struct GaussianEngine {
    roi_size: usize,
    half: usize,
    fit_background: bool,
    rejection: bool,
    init_sigma: f64,
    max_iterations: usize,
}

impl GaussianEngine {
    pub fn new(
        roi_size: usize,
        fit_background: bool,
        rejection: bool,
        init_sigma: f64,
        max_iterations: usize,
    ) -> Self {
        Self {
            roi_size,
            half: (roi_size - 1) / 2,
            fit_background,
            rejection,
            init_sigma,
            max_iterations,
        }
    }

    /// Fitted parameters of one window in local coordinates, or `None` on a
    /// failed or implausible fit.
    fn fit_window(&self, window: &RoiWindow, warm_sigma: Option<[f64; 2]>) -> Option<FittedPeak> {
        let n = self.roi_size;
        let edge = window.edge_background();
        let data = if self.fit_background {
            window.clone()
        } else {
            window.subtracted(edge)
        };

        let (seed_y, seed_x) = phasor_position(&data);
        let peek = |p: f64| (p.round().max(0.0) as usize).min(n - 1);
        let amplitude_seed = if self.fit_background {
            data.get(peek(seed_y), peek(seed_x)) - edge
        } else {
            data.get(peek(seed_y), peek(seed_x)) - data.min()
        };
        let [sy0, sx0] = warm_sigma.unwrap_or([self.init_sigma, self.init_sigma]);

        let mut seed = vec![amplitude_seed, seed_y, seed_x, sy0, sx0];
        if self.fit_background {
            seed.push(edge);
        }

        let values = data.values().to_vec();
        let fit_bg = self.fit_background;
        let residuals = move |p: &DVector<f64>| {
            DVector::from_iterator(
                n * n,
                values.iter().enumerate().map(|(i, v)| {
                    gaussian_model(p, i / n, i % n, fit_bg) - v
                }),
            )
        };
        let jacobian = move |p: &DVector<f64>| {
            let cols = if fit_bg { 6 } else { 5 };
            DMatrix::from_fn(n * n, cols, |i, j| {
                gaussian_partial(p, i / n, i % n, j)
            })
        };

        let opts = LmOptions {
            max_iterations: self.max_iterations,
            ..Default::default()
        };
        let out = levenberg_marquardt(residuals, jacobian, DVector::from_vec(seed), &opts)?;

        let amplitude = out.params[0];
        let (ly, lx) = (out.params[1], out.params[2]);
        let (sy, sx) = (out.params[3].abs(), out.params[4].abs());
        let background = if self.fit_background { out.params[5] } else { edge };

        let plausible = if self.rejection {
            let in_window = |p: f64| (0.0..=n as f64).contains(&p);
            in_window(ly)
                && in_window(lx)
                && amplitude > 0.0
                && amplitude <= MAX_AMPLITUDE
                && (MIN_SIGMA..=(self.half + 1) as f64).contains(&sy)
                && (MIN_SIGMA..=(self.half + 1) as f64).contains(&sx)
        } else {
            out.converged && amplitude > 0.0
        };
        if !plausible {
            return None;
        }

        Some(FittedPeak {
            amplitude,
            y: ly,
            x: lx,
            sigma_y: sy,
            sigma_x: sx,
            background,
            iterations: out.iterations,
        })
    }
}

struct FittedPeak {
    amplitude: f64,
    y: f64,
    x: f64,
    sigma_y: f64,
    sigma_x: f64,
    background: f64,
    iterations: usize,
}

impl FitEngine for GaussianEngine {
    fn fit_stack(&self, windows: &[RoiWindow], roi: &Roi, ctx: &PartContext) -> Vec<ResultRecord> {
        let mut warm_sigma: Option<[f64; 2]> = None;
        let mut records = Vec::with_capacity(windows.len());
        for (i, window) in windows.iter().enumerate() {
            let frame = ctx.start_frame + i;
            match self.fit_window(window, warm_sigma) {
                Some(peak) => {
                    warm_sigma = Some([peak.sigma_y, peak.sigma_x]);
                    let mut record = ResultRecord::nan(frame);
                    record.y = absolute_position(peak.y, roi.y, self.half, ctx.offset_from_base[0]);
                    record.x = absolute_position(peak.x, roi.x, self.half, ctx.offset_from_base[1]);
                    // Integrated photon count of the fitted surface.
                    record.intensity =
                        peak.amplitude * peak.sigma_y * peak.sigma_x * 2.0 * std::f64::consts::PI;
                    record.sigma_y = peak.sigma_y;
                    record.sigma_x = peak.sigma_x;
                    record.background = peak.background;
                    record.iterations = peak.iterations as f64;
                    records.push(record);
                }
                None => {
                    warm_sigma = None;
                    records.push(ResultRecord::nan(frame));
                }
            }
        }
        records
    }

    fn method(&self) -> FitMethod {
        if self.fit_background {
            FitMethod::GaussianFitBg
        } else {
            FitMethod::GaussianEstimateBg
        }
    }
}

#[inline]
fn gaussian_model(p: &DVector<f64>, y: usize, x: usize, with_background: bool) -> f64 {
    let dy = y as f64 - p[1];
    let dx = x as f64 - p[2];
    let e = (-dy * dy / (2.0 * p[3] * p[3]) - dx * dx / (2.0 * p[4] * p[4])).exp();
    let b = if with_background { p[5] } else { 0.0 };
    p[0] * e + b
}

/// Analytic partial derivative of the model w.r.t. parameter `j`.
fn gaussian_partial(p: &DVector<f64>, y: usize, x: usize, j: usize) -> f64 {
    let dy = y as f64 - p[1];
    let dx = x as f64 - p[2];
    let (sy, sx) = (p[3], p[4]);
    let e = (-dy * dy / (2.0 * sy * sy) - dx * dx / (2.0 * sx * sx)).exp();
    match j {
        0 => e,
        1 => p[0] * e * dy / (sy * sy),
        2 => p[0] * e * dx / (sx * sx),
        3 => p[0] * e * dy * dy / (sy * sy * sy),
        4 => p[0] * e * dx * dx / (sx * sx * sx),
        _ => 1.0,
    }
}
