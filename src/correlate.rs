//! Inter-part drift correlation.
//!
//! Overview
//! - Long acquisitions drift by whole pixels between dataset parts. Before
//!   fitting starts, the first frame of each correlation-anchored part is
//!   cross-correlated against the previous anchor, and the accumulated
//!   integer offset is attached to every part. The fitting windows then
//!   follow the emitters instead of losing them off the window edge.
//! - Frames are median-background subtracted first so the correlation tracks
//!   the emitters, not fixed-pattern background structure.

use log::debug;
use nalgebra::Vector2;

use crate::image::filters::subtract_median_background;
use crate::scheduler::DatasetPart;
use crate::source::FrameSource;

/// Integer-pixel displacement of `target` relative to `reference`, searched
/// over lags up to `max_lag` in both axes.
///
/// The score of a lag is the mean pixel product over the overlap region, so
/// different overlap sizes compare fairly. Ties prefer zero displacement, so
/// a featureless pair reports no drift.
pub fn correlate_frames(
    reference: &[f64],
    target: &[f64],
    width: usize,
    height: usize,
    max_lag: usize,
) -> Vector2<f64> {
    let lag = max_lag as isize;
    let mut best = (0isize, 0isize);
    let mut best_score = f64::NEG_INFINITY;
    for dy in -lag..=lag {
        for dx in -lag..=lag {
            let mut sum = 0.0;
            let mut count = 0usize;
            for y in 0..height as isize {
                let ty = y + dy;
                if ty < 0 || ty >= height as isize {
                    continue;
                }
                for x in 0..width as isize {
                    let tx = x + dx;
                    if tx < 0 || tx >= width as isize {
                        continue;
                    }
                    sum += reference[y as usize * width + x as usize]
                        * target[ty as usize * width + tx as usize];
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let score = sum / count as f64;
            let zero_first = (dy, dx) == (0, 0) && score >= best_score;
            if score > best_score || zero_first {
                best_score = score;
                best = (dy, dx);
            }
        }
    }
    Vector2::new(best.0 as f64, best.1 as f64)
}

/// Fill in `offset_from_base` for every part.
///
/// Correlation-anchored parts compare their first frame against the previous
/// anchor and advance the running offset; sub-parts created purely for
/// parallelism inherit the current offset unchanged.
pub fn anchor_parts(source: &dyn FrameSource, parts: &mut [DatasetPart], max_lag: usize) {
    let Some(first) = parts.first() else {
        return;
    };
    let (width, height) = (source.width(), source.height());
    let mut previous = subtract_median_background(&source.frame(first.range.start));
    let mut offset = Vector2::zeros();

    for (i, part) in parts.iter_mut().enumerate() {
        if i > 0 && part.correlate {
            let current = subtract_median_background(&source.frame(part.range.start));
            let step = correlate_frames(&previous, &current, width, height, max_lag);
            offset += step;
            previous = current;
            debug!(
                "part {} anchored at frame {}: step ({}, {}), offset ({}, {})",
                part.index, part.range.start, step[0], step[1], offset[0], offset[1]
            );
        }
        part.offset_from_base = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FrameMetadata, VideoStack};

    fn spot_frame(w: usize, h: usize, cy: usize, cx: usize) -> Vec<f64> {
        let mut data = vec![0.0; w * h];
        data[cy * w + cx] = 1000.0;
        data[cy * w + cx + 1] = 400.0;
        data[(cy + 1) * w + cx] = 400.0;
        data
    }

    #[test]
    fn integer_shift_is_recovered() {
        let reference = spot_frame(24, 24, 10, 12);
        let target = spot_frame(24, 24, 13, 11);
        let shift = correlate_frames(&reference, &target, 24, 24, 7);
        assert_eq!(shift, Vector2::new(3.0, -1.0));
    }

    #[test]
    fn featureless_frames_yield_zero_shift() {
        let flat = vec![0.0; 24 * 24];
        let shift = correlate_frames(&flat, &flat, 24, 24, 7);
        assert_eq!(shift, Vector2::zeros());
    }

    #[test]
    fn offsets_accumulate_across_anchored_parts() {
        // Three parts, the emitter steps +2 rows at each anchor.
        let mut stack = VideoStack::new(32, 32, FrameMetadata::default());
        for anchor in 0..3u16 {
            for _ in 0..4 {
                let mut data = vec![50u16; 32 * 32];
                let cy = 10 + 2 * anchor as usize;
                data[cy * 32 + 16] = 4000;
                data[cy * 32 + 17] = 1500;
                data[(cy + 1) * 32 + 16] = 1500;
                stack.push_frame(data);
            }
        }
        let mut parts: Vec<DatasetPart> = (0..3)
            .map(|i| DatasetPart {
                index: i,
                range: i * 4..(i + 1) * 4,
                correlate: true,
                offset_from_base: Vector2::zeros(),
            })
            .collect();
        anchor_parts(&stack, &mut parts, 7);
        assert_eq!(parts[0].offset_from_base, Vector2::zeros());
        assert_eq!(parts[1].offset_from_base, Vector2::new(2.0, 0.0));
        assert_eq!(parts[2].offset_from_base, Vector2::new(4.0, 0.0));
    }
}
