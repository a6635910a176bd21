//! External frame-source interface.
//!
//! The video reader lives outside this crate; the core only needs indexed
//! read access to 2D u16 frames plus optical metadata. Workers slice the
//! source by disjoint frame ranges, so implementations must be shareable
//! across threads but never need interior mutability.

use crate::image::FrameU16;

/// Optical and acquisition metadata attached to a frame source.
#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    /// Physical pixel size in micrometres.
    pub pixel_size_um: f64,
    /// Numerical aperture of the objective, when known.
    pub numerical_aperture: Option<f64>,
    /// Emission wavelength in nanometres, when known.
    pub wavelength_nm: Option<f64>,
    /// Per-frame timestamps in seconds, when the reader provides them.
    pub timestamps: Option<Vec<f64>>,
}

impl FrameMetadata {
    /// Diffraction-limit sigma guess in pixels:
    /// `wavelength / (2·NA·sqrt(8·ln 2))` converted with the pixel size.
    ///
    /// `None` when the optics are not calibrated; callers fall back to a
    /// fixed default.
    pub fn diffraction_sigma_px(&self) -> Option<f64> {
        let na = self.numerical_aperture?;
        let wavelength_nm = self.wavelength_nm?;
        let pixel_nm = self.pixel_size_um * 1000.0;
        if na <= 0.0 || pixel_nm <= 0.0 || wavelength_nm <= 0.0 {
            return None;
        }
        Some(wavelength_nm / (2.0 * na * (8.0 * 2.0f64.ln()).sqrt()) / pixel_nm)
    }
}

/// Read-only, integer-indexed access to a sequence of 2D u16 frames.
pub trait FrameSource: Send + Sync {
    /// Number of frames in the sequence.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frame width in pixels.
    fn width(&self) -> usize;

    /// Frame height in pixels.
    fn height(&self) -> usize;

    /// Borrow frame `index`. Panics are acceptable for out-of-range indices;
    /// the scheduler only requests validated ranges.
    fn frame(&self, index: usize) -> FrameU16<'_>;

    fn metadata(&self) -> &FrameMetadata;
}

/// In-memory frame stack, used by the demo binary and tests.
#[derive(Clone, Debug)]
pub struct VideoStack {
    width: usize,
    height: usize,
    frames: Vec<Vec<u16>>,
    metadata: FrameMetadata,
}

impl VideoStack {
    pub fn new(width: usize, height: usize, metadata: FrameMetadata) -> Self {
        Self {
            width,
            height,
            frames: Vec::new(),
            metadata,
        }
    }

    /// Append one frame; `data` must hold exactly `width·height` pixels.
    pub fn push_frame(&mut self, data: Vec<u16>) {
        assert_eq!(
            data.len(),
            self.width * self.height,
            "frame size must match the stack dimensions"
        );
        self.frames.push(data);
    }
}

impl FrameSource for VideoStack {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn frame(&self, index: usize) -> FrameU16<'_> {
        FrameU16 {
            w: self.width,
            h: self.height,
            stride: self.width,
            data: &self.frames[index],
        }
    }

    fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }
}
