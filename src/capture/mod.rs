//! Frame acquisition and guide-box geometry.
//!
//! This module provides:
//! - Frame sources for still images and live frame files (`FrameSource`)
//! - Guide box to source-pixel mapping (`compute_roi`)

pub mod region;
pub mod source;

pub use region::{compute_roi, GuideBox, RegionOfInterest};
pub use source::{AcquisitionMode, DisplaySize, FrameSource, SnapshotFileSource, StaticImageSource};
