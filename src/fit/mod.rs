//! Sub-pixel fitting engines.
//!
//! Overview
//! - Five methods share one per-frame contract: given the stack of ROI
//!   windows of a single emitter, produce exactly one [`ResultRecord`] per
//!   frame, with failures reported as NaN rows rather than omissions.
//! - [`phasor`] reads the position off the phase of the first-harmonic
//!   Fourier coefficients; exact for a pure single-peak signal and used both
//!   standalone and as the seed for the Gaussian methods.
//! - [`gaussian`] refines the phasor seed with a Levenberg–Marquardt
//!   least-squares solve ([`lm`]) of a symmetric-separable 2D Gaussian, with
//!   the background either pre-estimated from the window border or fitted as
//!   a free parameter.
//! - [`calibrate`] amortises solver cost by deriving the production
//!   iteration cap from the intensity distribution of a calibration pass.
//!
//! Coordinate convention: engines work in window-local continuous pixel
//! indices (0-based). [`absolute_position`] is the single point converting a
//! local estimate to full-frame coordinates; it adds the window corner, the
//! accumulated inter-part drift offset and the +0.5 pixel-centre shift.

pub mod calibrate;
pub mod gaussian;
pub mod lm;
pub mod phasor;

use nalgebra::Vector2;

use crate::image::RoiWindow;
use crate::settings::FitSettings;
use crate::types::{FitMethod, ResultRecord, Roi};

pub use gaussian::GaussianEngine;
pub use phasor::PhasorEngine;

/// Sigma seed when the frame source carries no optical calibration.
pub const DEFAULT_INIT_SIGMA: f64 = 1.2;

/// Per-part context shared by every ROI stack of one dataset part.
#[derive(Clone, Copy, Debug)]
pub struct PartContext {
    /// Global index of the part's first frame.
    pub start_frame: usize,
    /// Accumulated drift offset of this part relative to the first part,
    /// `[dy, dx]` in integer pixels.
    pub offset_from_base: Vector2<f64>,
}

/// Common contract of the five fitting methods.
///
/// `windows` holds one cropped window per frame of the part; the returned
/// vector always has the same length.
pub trait FitEngine: Send + Sync {
    fn fit_stack(
        &self,
        windows: &[RoiWindow],
        roi: &Roi,
        ctx: &PartContext,
    ) -> Vec<ResultRecord>;

    fn method(&self) -> FitMethod;
}

/// Build the engine selected by `settings`.
///
/// `max_iterations` only applies to the Gaussian methods (see
/// [`calibrate::calibrate_max_iterations`]); `init_sigma` seeds their width
/// parameters.
pub fn make_engine(
    settings: &FitSettings,
    max_iterations: usize,
    init_sigma: f64,
) -> Box<dyn FitEngine> {
    match settings.method {
        FitMethod::GaussianFitBg => Box::new(GaussianEngine::new(
            settings.roi_size,
            true,
            settings.rejection,
            init_sigma,
            max_iterations,
        )),
        FitMethod::GaussianEstimateBg => Box::new(GaussianEngine::new(
            settings.roi_size,
            false,
            settings.rejection,
            init_sigma,
            max_iterations,
        )),
        FitMethod::Phasor | FitMethod::PhasorIntensity | FitMethod::PhasorSum => Box::new(
            PhasorEngine::new(settings.method, settings.roi_size, settings.rejection),
        ),
    }
}

/// The single window-local → full-frame conversion point.
///
/// `local` is a continuous 0-based pixel index inside the window; the result
/// is the emitter position in full-frame pixel-centre coordinates. The
/// window is cropped at `center + offset`, and the same offset appears here,
/// so positions track the drifting emitter on the fixed pixel grid.
#[inline]
pub(crate) fn absolute_position(local: f64, center: usize, half: usize, offset: f64) -> f64 {
    local + center as f64 - half as f64 + 0.5 + offset
}
