#![doc = include_str!("../README.md")]

pub mod config;
pub mod correlate;
pub mod drift;
pub mod fit;
pub mod image;
pub mod peaks;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod stats;
pub mod types;

pub use config::{load_config, parse_config, RunConfig};
pub use drift::{DriftCorrector, DriftResult};
pub use fit::{make_engine, FitEngine, PartContext};
pub use peaks::{find_peaks, Peak, PeakFinderParams};
pub use scheduler::{DatasetScheduler, FitOutput, RunSummary};
pub use settings::{FitSettings, OutputUnits, SettingsError};
pub use source::{FrameMetadata, FrameSource, VideoStack};
pub use types::{FitMethod, ResultRecord, Roi, Trajectory, TrajectorySet};
