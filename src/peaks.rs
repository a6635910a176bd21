//! Candidate-peak detector for initial ROI discovery.
//!
//! Overview
//! - Smooths the frame with a 3×3 running average, then flags pixels that
//!   dominate their 8-neighborhood. Ties on plateaus are broken by using a
//!   strict comparison against half the neighbors and a non-strict one
//!   against the other half, so a flat plateau yields at most one candidate.
//! - The acceptance threshold is Poisson-motivated:
//!   `background_mean + k·sqrt(background_mean)`, with the background mean
//!   taken over pixels not already claimed by known ROI windows.
//! - Candidates within half an ROI window of the frame border are dropped,
//!   since their fitting window would fall outside the frame.

use serde::Deserialize;

use crate::image::FrameU16;
use crate::types::Roi;

/// Peak detection knobs.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct PeakFinderParams {
    /// Square ROI window side; candidates closer than half of it to the
    /// border are discarded.
    pub roi_size: usize,
    /// `k` in the `background + k·sqrt(background)` acceptance threshold.
    pub threshold_multiplier: f64,
}

impl Default for PeakFinderParams {
    fn default() -> Self {
        Self {
            roi_size: 7,
            threshold_multiplier: 5.0,
        }
    }
}

/// One candidate emitter location with its raw peak pixel value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Detect candidate emitters in one frame.
///
/// `known_rois` only affects the background statistics: pixels inside their
/// windows are excluded so bright, already-claimed emitters do not inflate
/// the threshold. A frame with no unclaimed pixels yields no peaks rather
/// than an error.
pub fn find_peaks(frame: &FrameU16<'_>, known_rois: &[Roi], params: &PeakFinderParams) -> Vec<Peak> {
    let (w, h) = (frame.w, frame.h);
    let half = (params.roi_size - 1) / 2;
    if w < params.roi_size || h < params.roi_size {
        return Vec::new();
    }

    let Some(threshold) = acceptance_threshold(frame, known_rois, half, params.threshold_multiplier)
    else {
        return Vec::new();
    };

    let smoothed = box_smooth_3x3(frame);
    let at = |y: usize, x: usize| smoothed[y * w + x];

    let mut peaks = Vec::new();
    for y in half..h - half {
        for x in half..w - half {
            let center = at(y, x);
            // Strict on four neighbors, non-strict on the other four: a flat
            // plateau cannot produce two adjacent candidates.
            let is_max = center > at(y, x + 1)
                && center >= at(y, x - 1)
                && center > at(y + 1, x)
                && center >= at(y - 1, x)
                && center >= at(y - 1, x - 1)
                && center >= at(y - 1, x + 1)
                && center > at(y + 1, x - 1)
                && center >= at(y + 1, x + 1);
            if !is_max {
                continue;
            }
            let value = frame.get(y, x) as f64;
            if value > threshold {
                peaks.push(Peak { row: y, col: x, value });
            }
        }
    }
    peaks
}

/// Background mean over pixels not claimed by any known ROI window, turned
/// into the Poisson acceptance threshold. `None` when every pixel is claimed.
fn acceptance_threshold(
    frame: &FrameU16<'_>,
    known_rois: &[Roi],
    half: usize,
    multiplier: f64,
) -> Option<f64> {
    let (w, h) = (frame.w, frame.h);
    let mut claimed = vec![false; w * h];
    for roi in known_rois {
        let y0 = roi.y.saturating_sub(half);
        let x0 = roi.x.saturating_sub(half);
        let y1 = (roi.y + half + 1).min(h);
        let x1 = (roi.x + half + 1).min(w);
        for y in y0..y1 {
            for x in x0..x1 {
                claimed[y * w + x] = true;
            }
        }
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            if !claimed[y * w + x] {
                sum += frame.get(y, x) as f64;
                count += 1;
            }
        }
    }
    if count == 0 {
        return None;
    }
    let background = sum / count as f64;
    Some(background + multiplier * background.sqrt())
}

/// 3×3 box average with zero fill outside the frame (divisor fixed at 9).
fn box_smooth_3x3(frame: &FrameU16<'_>) -> Vec<f64> {
    let (w, h) = (frame.w as isize, frame.h as isize);
    let mut out = Vec::with_capacity(frame.w * frame.h);
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (yy, xx) = (y + dy, x + dx);
                    if yy >= 0 && xx >= 0 && yy < h && xx < w {
                        sum += frame.get(yy as usize, xx as usize) as f64;
                    }
                }
            }
            out.push(sum / 9.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uniform frame with a peaked, cross-shaped spot stamped in. A lone hot
    /// pixel would smooth into a flat plateau; a shaped spot keeps a strict
    /// maximum after the 3×3 average.
    fn frame_with_spot(w: usize, h: usize, background: u16, spot: (usize, usize, u16)) -> Vec<u16> {
        let mut data = vec![background; w * h];
        let (r, c, peak) = spot;
        data[r * w + c] = peak;
        for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
            let (y, x) = (r as isize + dr, c as isize + dc);
            if y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w {
                data[y as usize * w + x as usize] = peak / 4;
            }
        }
        for (dr, dc) in [(-1isize, -1isize), (-1, 1), (1, -1), (1, 1)] {
            let (y, x) = (r as isize + dr, c as isize + dc);
            if y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w {
                data[y as usize * w + x as usize] = peak / 12;
            }
        }
        data
    }

    #[test]
    fn flat_frame_yields_no_peaks() {
        let data = vec![100u16; 32 * 32];
        let frame = FrameU16 {
            w: 32,
            h: 32,
            stride: 32,
            data: &data,
        };
        let peaks = find_peaks(&frame, &[], &PeakFinderParams::default());
        assert!(peaks.is_empty());
    }

    #[test]
    fn bright_spot_is_found_and_border_spots_are_dropped() {
        let data = frame_with_spot(32, 32, 10, (16, 12, 4000));
        let frame = FrameU16 {
            w: 32,
            h: 32,
            stride: 32,
            data: &data,
        };
        let peaks = find_peaks(&frame, &[], &PeakFinderParams::default());
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].row, peaks[0].col), (16, 12));
        assert_eq!(peaks[0].value, 4000.0);

        let border = frame_with_spot(32, 32, 10, (1, 16, 4000));
        let frame = FrameU16 {
            w: 32,
            h: 32,
            stride: 32,
            data: &border,
        };
        assert!(find_peaks(&frame, &[], &PeakFinderParams::default()).is_empty());
    }

    #[test]
    fn claimed_rois_do_not_inflate_the_threshold() {
        // A very bright known emitter would push the naive background mean
        // high enough to mask the dim new spot.
        let mut data = frame_with_spot(32, 32, 10, (16, 16, 600));
        for y in 5..10 {
            for x in 5..10 {
                data[y * 32 + x] = 60_000;
            }
        }
        let frame = FrameU16 {
            w: 32,
            h: 32,
            stride: 32,
            data: &data,
        };
        let known = [Roi { index: 0, y: 7, x: 7 }];
        let params = PeakFinderParams {
            roi_size: 9,
            threshold_multiplier: 5.0,
        };
        let peaks = find_peaks(&frame, &known, &params);
        assert!(peaks.iter().any(|p| (p.row, p.col) == (16, 16)));
    }
}
