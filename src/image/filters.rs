//! Rolling local-median background removal.
//!
//! The inter-part correlator aligns first frames on structure, not on slowly
//! varying illumination. A local median with a window large enough to span
//! any single emitter (9×9 for 7×7/9×9 ROIs) estimates that illumination
//! field; subtracting it leaves near-zero-mean residual structure suitable
//! for cross-correlation. Pixels outside the frame count as zero, matching a
//! constant-padding convention.

use super::FrameU16;

/// Local median of `frame` over a `size`×`size` neighborhood (constant zero
/// padding). `size` must be odd.
pub fn median_background(frame: &FrameU16<'_>, size: usize) -> Vec<f64> {
    debug_assert!(size % 2 == 1, "median window must be odd-sized");
    let half = (size / 2) as isize;
    let mut out = Vec::with_capacity(frame.w * frame.h);
    let mut buf: Vec<u16> = Vec::with_capacity(size * size);
    for y in 0..frame.h as isize {
        for x in 0..frame.w as isize {
            buf.clear();
            for dy in -half..=half {
                for dx in -half..=half {
                    let (yy, xx) = (y + dy, x + dx);
                    let inside =
                        yy >= 0 && xx >= 0 && yy < frame.h as isize && xx < frame.w as isize;
                    buf.push(if inside {
                        frame.get(yy as usize, xx as usize)
                    } else {
                        0
                    });
                }
            }
            buf.sort_unstable();
            out.push(buf[buf.len() / 2] as f64);
        }
    }
    out
}

/// Frame minus its 9×9 local-median background, as a row-major f64 buffer.
pub fn subtract_median_background(frame: &FrameU16<'_>) -> Vec<f64> {
    let background = median_background(frame, 9);
    (0..frame.h)
        .flat_map(|y| frame.row(y))
        .zip(background)
        .map(|(&px, bg)| px as f64 - bg)
        .collect()
}
