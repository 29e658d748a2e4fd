//! Platform shell around the DOOM engine: frame delivery to the dock
//! icon, the camera capture session feeding the expression classifier,
//! and the persisted face control switch.

pub mod capture;
pub mod coalescer;
pub mod control;
pub mod queue;
pub mod render;
pub mod settings;

pub use capture::{CaptureSession, SessionState};
pub use coalescer::{FrameCoalescer, FrameSurface};
pub use control::{CameraEntry, ControlError, ControlEvent, FaceControl, Status};
pub use queue::SerialQueue;
pub use render::{IconRenderer, RenderCoordinator, ICON_SIZE};
pub use settings::{KeyValueStore, MemoryStore, Settings, StoreError, TomlStore};
