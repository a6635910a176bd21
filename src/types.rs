//! Core result model shared by the fitting engines, scheduler and drift
//! corrector.
//!
//! A [`ResultRecord`] is one row per (ROI, frame). Failed fits are represented
//! as NaN rows with only the frame index populated, so a merged
//! [`Trajectory`] always has exactly one record per requested frame.

use serde::{Deserialize, Serialize};

/// Fitting method selector. The serde names match the user-facing labels of
/// the settings file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    #[serde(rename = "Gaussian - Fit bg")]
    GaussianFitBg,
    #[serde(rename = "Gaussian - Estimate bg")]
    GaussianEstimateBg,
    #[serde(rename = "Phasor + Intensity")]
    PhasorIntensity,
    #[serde(rename = "Phasor + Sum")]
    PhasorSum,
    #[serde(rename = "Phasor")]
    Phasor,
}

impl FitMethod {
    /// True for the two Levenberg–Marquardt Gaussian variants.
    #[inline]
    pub fn is_gaussian(&self) -> bool {
        matches!(self, FitMethod::GaussianFitBg | FitMethod::GaussianEstimateBg)
    }

    /// Stable column order of the tabular export for this method.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            FitMethod::GaussianFitBg | FitMethod::GaussianEstimateBg => &[
                "frame",
                "y",
                "x",
                "intensity",
                "sigma_y",
                "sigma_x",
                "background",
                "iterations",
            ],
            FitMethod::PhasorIntensity => &["frame", "y", "x", "intensity", "background"],
            FitMethod::PhasorSum => &["frame", "y", "x", "intensity"],
            FitMethod::Phasor => &["frame", "y", "x"],
        }
    }
}

/// A fixed region of interest: integer center in full-frame coordinates.
///
/// ROIs are created once by the peak-finding stage and stay immutable for the
/// lifetime of a fitting run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Roi {
    pub index: usize,
    /// Center row in full-frame coordinates.
    pub y: usize,
    /// Center column in full-frame coordinates.
    pub x: usize,
}

impl Roi {
    /// Window center after applying an inter-part drift offset, rounded to
    /// the pixel grid.
    #[inline]
    pub fn window_center(&self, offset: nalgebra::Vector2<f64>) -> (isize, isize) {
        (
            self.y as isize + offset[0].round() as isize,
            self.x as isize + offset[1].round() as isize,
        )
    }

    /// Whether the full window (center ± `half`) still lies inside the frame
    /// after the accumulated drift offset.
    pub fn in_frame(
        &self,
        width: usize,
        height: usize,
        half: usize,
        offset: nalgebra::Vector2<f64>,
    ) -> bool {
        let (cy, cx) = self.window_center(offset);
        let half = half as isize;
        cy - half >= 0
            && cx - half >= 0
            && cy + half < height as isize
            && cx + half < width as isize
    }
}

/// One fitted row. Fields not produced by the active method stay NaN; a
/// failed fit is all-NaN with only `frame` populated.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ResultRecord {
    pub frame: usize,
    pub y: f64,
    pub x: f64,
    pub intensity: f64,
    pub sigma_y: f64,
    pub sigma_x: f64,
    pub background: f64,
    pub iterations: f64,
}

impl ResultRecord {
    /// NaN row marking a failed fit on `frame`.
    pub fn nan(frame: usize) -> Self {
        Self {
            frame,
            y: f64::NAN,
            x: f64::NAN,
            intensity: f64::NAN,
            sigma_y: f64::NAN,
            sigma_x: f64::NAN,
            background: f64::NAN,
            iterations: f64::NAN,
        }
    }

    /// A record counts as a successful fit when it carries a position.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.y.is_finite() && self.x.is_finite()
    }

    /// Flatten into the stable column order of `method`.
    pub fn to_row(&self, method: FitMethod) -> Vec<f64> {
        match method {
            FitMethod::GaussianFitBg | FitMethod::GaussianEstimateBg => vec![
                self.frame as f64,
                self.y,
                self.x,
                self.intensity,
                self.sigma_y,
                self.sigma_x,
                self.background,
                self.iterations,
            ],
            FitMethod::PhasorIntensity => vec![
                self.frame as f64,
                self.y,
                self.x,
                self.intensity,
                self.background,
            ],
            FitMethod::PhasorSum => {
                vec![self.frame as f64, self.y, self.x, self.intensity]
            }
            FitMethod::Phasor => vec![self.frame as f64, self.y, self.x],
        }
    }
}

/// Merged time trace of one ROI.
#[derive(Clone, Debug, Serialize)]
pub struct Trajectory {
    pub roi_index: usize,
    pub records: Vec<ResultRecord>,
}

/// All per-ROI trajectories of one fitting run, in ROI order.
#[derive(Clone, Debug, Serialize)]
pub struct TrajectorySet {
    pub method: FitMethod,
    /// First fitted frame index (global).
    pub start_frame: usize,
    /// Number of requested frames; every trajectory has exactly this length.
    pub n_frames: usize,
    pub trajectories: Vec<Trajectory>,
}

impl TrajectorySet {
    /// Scale positions (and sigmas, for Gaussian methods) from pixels to
    /// nanometres. Applied once, after the merge.
    pub fn to_physical_units(&mut self, pixel_size_um: f64) {
        let nm_per_px = pixel_size_um * 1000.0;
        let scale_sigmas = self.method.is_gaussian();
        for trajectory in &mut self.trajectories {
            for record in &mut trajectory.records {
                record.y *= nm_per_px;
                record.x *= nm_per_px;
                if scale_sigmas {
                    record.sigma_y *= nm_per_px;
                    record.sigma_x *= nm_per_px;
                }
            }
        }
    }
}
