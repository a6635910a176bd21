//! Frame views and small raster utilities.
//!
//! - [`FrameU16`] – borrowed single-channel 16-bit view of one video frame.
//! - [`RoiWindow`] – small owned f64 window cropped around an ROI center.
//! - [`filters`] – rolling local-median background removal used by the
//!   inter-part correlator.

pub mod filters;
mod frame;
mod window;

pub use frame::FrameU16;
pub use window::RoiWindow;
