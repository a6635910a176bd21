//! Borrowed single-channel u16 frame view in row-major layout.
//!
//! Frames are owned by the external frame source and read-only to the core;
//! this view mirrors that contract.

/// Borrowed 16-bit grayscale frame (row-major, `stride` elements per row).
#[derive(Clone, Copy, Debug)]
pub struct FrameU16<'a> {
    /// Frame width in pixels
    pub w: usize,
    /// Frame height in pixels
    pub h: usize,
    /// Number of u16 elements between consecutive rows (usually equals `w`)
    pub stride: usize,
    /// Backing pixel storage
    pub data: &'a [u16],
}

impl<'a> FrameU16<'a> {
    #[inline]
    /// Convert (y, x) to a linear index into `data`.
    pub fn idx(&self, y: usize, x: usize) -> usize {
        y * self.stride + x
    }

    #[inline]
    /// Get the pixel value at (y, x).
    pub fn get(&self, y: usize, x: usize) -> u16 {
        self.data[self.idx(y, x)]
    }

    #[inline]
    /// Borrow row `y` as a slice of `w` pixels.
    pub fn row(&self, y: usize) -> &'a [u16] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }
}
