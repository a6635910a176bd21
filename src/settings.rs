//! Run configuration and its validation.
//!
//! All settings are fixed before a run starts; validation happens up front so
//! a bad configuration never performs partial work.

use std::fmt;
use std::ops::Range;

use serde::Deserialize;

use crate::types::FitMethod;

/// Default memory budget for resident frame data (4 GiB).
pub const DEFAULT_MEMORY_BUDGET: usize = 4 * 1024 * 1024 * 1024;

/// Output coordinate units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum OutputUnits {
    #[serde(rename = "pixels")]
    Pixels,
    #[serde(rename = "nm")]
    Nm,
}

/// Immutable settings of one fitting run.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub method: FitMethod,
    /// Discard physically implausible fit results instead of reporting them.
    pub rejection: bool,
    /// Square ROI window side; 7 or 9.
    pub roi_size: usize,
    /// Worker threads for the fitting pool.
    pub worker_count: usize,
    pub output_units: OutputUnits,
    /// First frame to fit; `None` means the dataset start.
    pub frame_begin: Option<usize>,
    /// One past the last frame to fit; `None` means the dataset end.
    pub frame_end: Option<usize>,
    /// Re-anchor drift every this many frames; `None` means never.
    pub correlation_interval: Option<usize>,
    /// Hard budget for frames resident in memory at once, in bytes.
    pub memory_budget_bytes: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            method: FitMethod::GaussianEstimateBg,
            rejection: true,
            roi_size: 7,
            worker_count: 1,
            output_units: OutputUnits::Pixels,
            frame_begin: None,
            frame_end: None,
            correlation_interval: None,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
        }
    }
}

impl FitSettings {
    /// Half ROI side, the window "radius" in pixels.
    #[inline]
    pub fn half(&self) -> usize {
        (self.roi_size - 1) / 2
    }

    /// Resolve the requested frame range against the dataset length and
    /// reject invalid configurations before any fitting starts.
    pub fn resolve_range(&self, n_frames: usize) -> Result<Range<usize>, SettingsError> {
        if self.roi_size != 7 && self.roi_size != 9 {
            return Err(SettingsError::InvalidRoiSize { size: self.roi_size });
        }
        if self.worker_count == 0 {
            return Err(SettingsError::NoWorkers);
        }
        let begin = self.frame_begin.unwrap_or(0);
        let end = self.frame_end.unwrap_or(n_frames);
        if end > n_frames {
            return Err(SettingsError::RangeOutOfBounds { end, n_frames });
        }
        if begin >= end {
            return Err(SettingsError::EmptyRange { begin, end });
        }
        if let Some(interval) = self.correlation_interval {
            if interval == 0 || interval > end - begin {
                return Err(SettingsError::InvalidCorrelationInterval {
                    interval,
                    range_len: end - begin,
                });
            }
        }
        Ok(begin..end)
    }
}

/// Configuration errors, all fatal to the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsError {
    InvalidRoiSize { size: usize },
    NoWorkers,
    EmptyRange { begin: usize, end: usize },
    RangeOutOfBounds { end: usize, n_frames: usize },
    InvalidCorrelationInterval { interval: usize, range_len: usize },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::InvalidRoiSize { size } => {
                write!(f, "ROI size must be 7 or 9, got {size}")
            }
            SettingsError::NoWorkers => write!(f, "worker count must be positive"),
            SettingsError::EmptyRange { begin, end } => {
                write!(f, "frame range [{begin}, {end}) is empty")
            }
            SettingsError::RangeOutOfBounds { end, n_frames } => {
                write!(f, "frame range ends at {end} but the dataset has {n_frames} frames")
            }
            SettingsError::InvalidCorrelationInterval {
                interval,
                range_len,
            } => write!(
                f,
                "correlation interval {interval} must be positive and at most the \
                 requested range length {range_len}"
            ),
        }
    }
}

impl std::error::Error for SettingsError {}
