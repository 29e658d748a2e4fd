//! facedoom-hw — Camera discovery, landmark tracking and frame imaging.
//!
//! Provides V4L2 device enumeration and access checks, an OpenSeeFace
//! tracker process as the landmark source, and RGBA engine frames with
//! icon scaling.

pub mod camera;
pub mod frame;
pub mod tracker;

pub use camera::{
    Authorization, CameraAccess, CameraError, DeviceCatalog, DeviceInfo, NodeAccess, V4lCatalog,
};
pub use frame::{FrameError, RgbaFrame};
pub use tracker::{LandmarkSource, ObservationCallback, OsfTracker, TrackerConfig, TrackerError};
