//! Routing of engine frames to the window and the icon.

use crate::coalescer::{FrameCoalescer, FrameSurface};
use crate::queue::SerialQueue;
use facedoom_core::Resolution;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default edge length of the rendered icon in pixels.
pub const ICON_SIZE: u32 = 128;

/// Writes each delivered frame as a square PNG icon, replacing the file
/// atomically so readers never see a partial image.
pub struct IconRenderer {
    path: PathBuf,
    size: u32,
}

impl IconRenderer {
    pub fn new(path: impl Into<PathBuf>, size: u32) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl FrameSurface for IconRenderer {
    fn present(&self, frame: &facedoom_hw::RgbaFrame) {
        let icon = frame.to_icon(self.size);
        let tmp = self.path.with_extension("png.tmp");
        let result = icon
            .save_with_format(&tmp, image::ImageFormat::Png)
            .map_err(|e| e.to_string())
            .and_then(|()| std::fs::rename(&tmp, &self.path).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write icon");
        }
    }
}

/// Receives every engine frame. The main surface gets each one directly;
/// the icon gets them through a coalescer, and only while icon rendering
/// is on and the window is minimized.
pub struct RenderCoordinator {
    resolution: Resolution,
    main: Option<Arc<dyn FrameSurface>>,
    icon: FrameCoalescer,
    icon_enabled: AtomicBool,
    minimized: AtomicBool,
}

impl RenderCoordinator {
    pub fn new(
        resolution: Resolution,
        main: Option<Arc<dyn FrameSurface>>,
        presenter: SerialQueue,
        icon: Arc<dyn FrameSurface>,
    ) -> Self {
        Self {
            resolution,
            main,
            icon: FrameCoalescer::new(presenter, icon),
            icon_enabled: AtomicBool::new(false),
            minimized: AtomicBool::new(false),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn set_icon_enabled(&self, enabled: bool) {
        self.icon_enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "icon rendering toggled");
    }

    pub fn icon_enabled(&self) -> bool {
        self.icon_enabled.load(Ordering::SeqCst)
    }

    pub fn set_window_minimized(&self, minimized: bool) {
        self.minimized.store(minimized, Ordering::SeqCst);
    }

    /// Engine frame-ready callback. `data` is one RGBA frame at the
    /// engine resolution; anything else is dropped.
    pub fn frame_ready(&self, data: &[u8]) {
        if data.len() != self.resolution.frame_len() {
            tracing::trace!(len = data.len(), "dropping frame of unexpected size");
            return;
        }
        let (width, height) = (
            i64::from(self.resolution.width),
            i64::from(self.resolution.height),
        );

        if let Some(main) = &self.main {
            if let Ok(frame) = facedoom_hw::RgbaFrame::new(data.to_vec(), width, height) {
                main.present(&frame);
            }
        }

        if self.icon_enabled() && self.minimized.load(Ordering::SeqCst) {
            self.icon.submit(data.to_vec(), width, height);
        }
    }
}
