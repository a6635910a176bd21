//! Synthetic emitter videos for the integration tests.

use spot_tracker::{FrameMetadata, VideoStack};

/// One synthetic Gaussian emitter at a fixed sub-pixel position.
#[derive(Clone, Copy, Debug)]
pub struct Emitter {
    pub y: f64,
    pub x: f64,
    pub amplitude: f64,
    pub sigma: f64,
}

impl Emitter {
    pub fn new(y: f64, x: f64) -> Self {
        Self {
            y,
            x,
            amplitude: 3000.0,
            sigma: 1.2,
        }
    }
}

/// Render one frame: emitters displaced by `shift`, on a flat background,
/// quantized to u16 like a real camera.
pub fn emitter_frame(
    width: usize,
    height: usize,
    background: f64,
    emitters: &[Emitter],
    shift: (f64, f64),
) -> Vec<u16> {
    let mut data = vec![background; width * height];
    for emitter in emitters {
        let (cy, cx) = (emitter.y + shift.0, emitter.x + shift.1);
        for y in 0..height {
            for x in 0..width {
                let dy = y as f64 - cy;
                let dx = x as f64 - cx;
                let s2 = 2.0 * emitter.sigma * emitter.sigma;
                data[y * width + x] += emitter.amplitude * (-(dy * dy + dx * dx) / s2).exp();
            }
        }
    }
    data.iter().map(|v| v.round().max(0.0) as u16).collect()
}

/// A stack of `n_frames` frames drifting by `drift_per_frame` pixels per
/// frame.
pub fn emitter_stack(
    width: usize,
    height: usize,
    n_frames: usize,
    background: f64,
    emitters: &[Emitter],
    drift_per_frame: (f64, f64),
) -> VideoStack {
    let mut stack = VideoStack::new(
        width,
        height,
        FrameMetadata {
            pixel_size_um: 0.1,
            ..Default::default()
        },
    );
    for frame in 0..n_frames {
        let shift = (
            drift_per_frame.0 * frame as f64,
            drift_per_frame.1 * frame as f64,
        );
        stack.push_frame(emitter_frame(width, height, background, emitters, shift));
    }
    stack
}
