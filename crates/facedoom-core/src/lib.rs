//! facedoom-core — Face expression classification and input translation.
//!
//! Pure logic shared by the shell and the daemon: landmark geometry to
//! expression codes, keyboard and touch to engine key codes, and the
//! traits describing the external engine.

pub mod classifier;
pub mod engine;
pub mod input;
pub mod types;

pub use classifier::{classify, ExpressionClassifier, FrameDecimator, HysteresisGate};
pub use engine::{DoomEngine, ExpressionSink, Resolution};
pub use types::{BoundingBox, Expression, FaceObservation, Point};
