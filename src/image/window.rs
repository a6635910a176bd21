//! Small square f64 window cropped around an ROI center.
//!
//! Windows are the unit the fitting engines operate on: 7×7 or 9×9 pixels,
//! converted to f64 so background subtraction can go negative without
//! wrapping.

use super::FrameU16;

/// Owned square pixel window of side `size`.
#[derive(Clone, Debug)]
pub struct RoiWindow {
    size: usize,
    data: Vec<f64>,
}

impl RoiWindow {
    /// Crop a `(2·half + 1)`-sided window centered on `(cy, cx)`.
    ///
    /// Returns `None` when any part of the window falls outside the frame;
    /// callers treat that as the ROI having drifted out of view.
    pub fn from_frame(frame: &FrameU16<'_>, cy: isize, cx: isize, half: usize) -> Option<Self> {
        let half = half as isize;
        if cy - half < 0
            || cx - half < 0
            || cy + half >= frame.h as isize
            || cx + half >= frame.w as isize
        {
            return None;
        }
        let size = (2 * half + 1) as usize;
        let mut data = Vec::with_capacity(size * size);
        for y in (cy - half)..=(cy + half) {
            for x in (cx - half)..=(cx + half) {
                data.push(frame.get(y as usize, x as usize) as f64);
            }
        }
        Some(Self { size, data })
    }

    /// Build a window from raw values; `values.len()` must be `size²`.
    pub fn from_values(size: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), size * size, "window storage must be square");
        Self { size, data: values }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> f64 {
        self.data[y * self.size + x]
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Mean of the one-pixel border ring, used as a cheap per-frame
    /// background estimate.
    pub fn edge_background(&self) -> f64 {
        let n = self.size;
        let mut sum = 0.0;
        let mut count = 0usize;
        for x in 0..n {
            sum += self.get(0, x) + self.get(n - 1, x);
            count += 2;
        }
        for y in 1..n - 1 {
            sum += self.get(y, 0) + self.get(y, n - 1);
            count += 2;
        }
        sum / count as f64
    }

    /// Copy of the window with a constant background removed.
    pub fn subtracted(&self, background: f64) -> Self {
        Self {
            size: self.size,
            data: self.data.iter().map(|v| v - background).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_3x3_plus_border() -> Vec<u16> {
        // 5x5 frame: border 10, inner cross raised
        let mut data = vec![10u16; 25];
        data[12] = 100; // center
        data
    }

    #[test]
    fn crop_rejects_out_of_bounds_centers() {
        let data = frame_3x3_plus_border();
        let frame = FrameU16 {
            w: 5,
            h: 5,
            stride: 5,
            data: &data,
        };
        assert!(RoiWindow::from_frame(&frame, 2, 2, 2).is_some());
        assert!(RoiWindow::from_frame(&frame, 1, 2, 2).is_none());
        assert!(RoiWindow::from_frame(&frame, 2, 4, 2).is_none());
    }

    #[test]
    fn edge_background_is_border_ring_mean() {
        let data = frame_3x3_plus_border();
        let frame = FrameU16 {
            w: 5,
            h: 5,
            stride: 5,
            data: &data,
        };
        let window = RoiWindow::from_frame(&frame, 2, 2, 2).unwrap();
        // Border ring is uniformly 10; the bright center must not leak in.
        assert_eq!(window.edge_background(), 10.0);
        assert_eq!(window.max(), 100.0);
        assert_eq!(window.subtracted(10.0).get(2, 2), 90.0);
    }
}
