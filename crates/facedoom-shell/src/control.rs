//! Face control on/off switch, camera selection and dock rendering,
//! backed by persisted settings.

use crate::capture::{CaptureSession, SessionState};
use crate::render::RenderCoordinator;
use crate::settings::{
    persist_bool, persist_string, KeyValueStore, Settings, CAMERA_UNIQUE_ID_KEY,
    DOCK_RENDER_ENABLED_KEY, FACE_CONTROL_ENABLED_KEY,
};
use facedoom_core::Expression;
use facedoom_hw::camera::{resolve_device, Authorization, CameraAccess, DeviceCatalog, DeviceInfo};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ControlError {
    #[error("camera access denied for {0}; grant read/write access to the device node")]
    CameraAccessDenied(String),
    #[error("unknown camera: {0}")]
    UnknownCamera(String),
}

/// Published whenever a user-visible setting changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    StateChanged { enabled: bool },
    CameraChanged { unique_id: String },
    DockRenderChanged { enabled: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraEntry {
    #[serde(flatten)]
    pub device: DeviceInfo,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub enabled: bool,
    pub capture: SessionState,
    pub camera: Option<DeviceInfo>,
    pub expression: Expression,
    pub dock_render: bool,
}

const EVENT_CAPACITY: usize = 16;

pub struct FaceControl {
    store: Arc<dyn KeyValueStore>,
    capture: CaptureSession,
    catalog: Arc<dyn DeviceCatalog>,
    access: Arc<dyn CameraAccess>,
    render: Arc<RenderCoordinator>,
    enabled: Mutex<bool>,
    events: broadcast::Sender<ControlEvent>,
}

impl FaceControl {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        capture: CaptureSession,
        catalog: Arc<dyn DeviceCatalog>,
        access: Arc<dyn CameraAccess>,
        render: Arc<RenderCoordinator>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            capture,
            catalog,
            access,
            render,
            enabled: Mutex::new(false),
            events,
        }
    }

    fn lock_enabled(&self) -> MutexGuard<'_, bool> {
        self.enabled.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: ControlEvent) {
        tracing::debug!(?event, "control event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    pub fn is_enabled(&self) -> bool {
        *self.lock_enabled()
    }

    /// Apply persisted preferences at startup. A denied camera here turns
    /// the feature off without reporting an error.
    pub fn restore(&self, settings: &Settings) {
        self.capture
            .set_preferred_camera(settings.camera_unique_id.clone());
        self.render.set_icon_enabled(settings.dock_render_enabled);
        if settings.face_control_enabled {
            // Not user initiated, so this cannot fail.
            let _ = self.set_enabled(true, false);
        }
    }

    /// Turn face control on or off. Enabling checks camera access first;
    /// a denial switches the feature off and is only reported back when
    /// the request came from the user.
    pub fn set_enabled(&self, enabled: bool, user_initiated: bool) -> Result<(), ControlError> {
        let mut current = self.lock_enabled();
        if *current == enabled {
            return Ok(());
        }

        if enabled {
            if let Some(device) = self.resolved_device() {
                if self.access.authorization(&device) == Authorization::Denied {
                    tracing::warn!(camera = %device.path, user_initiated, "face control refused: camera access denied");
                    persist_bool(self.store.as_ref(), FACE_CONTROL_ENABLED_KEY, false);
                    self.publish(ControlEvent::StateChanged { enabled: false });
                    if user_initiated {
                        return Err(ControlError::CameraAccessDenied(device.path));
                    }
                    return Ok(());
                }
            }
        }

        // Held through the capture call so toggles reach the session in order.
        *current = enabled;
        persist_bool(self.store.as_ref(), FACE_CONTROL_ENABLED_KEY, enabled);
        tracing::info!(enabled, "face control toggled");
        self.publish(ControlEvent::StateChanged { enabled });
        if enabled {
            self.capture.start();
        } else {
            self.capture.stop();
        }
        Ok(())
    }

    /// Switch to the camera with `unique_id`, restarting capture on it if
    /// running.
    pub fn select_camera(&self, unique_id: &str) -> Result<(), ControlError> {
        if !self.catalog.devices().iter().any(|d| d.unique_id() == unique_id) {
            return Err(ControlError::UnknownCamera(unique_id.to_string()));
        }
        persist_string(self.store.as_ref(), CAMERA_UNIQUE_ID_KEY, unique_id);
        self.capture.set_preferred_camera(Some(unique_id.to_string()));
        self.publish(ControlEvent::CameraChanged {
            unique_id: unique_id.to_string(),
        });
        Ok(())
    }

    /// Available cameras with the effective selection marked. When the
    /// stored camera is gone the default takes its place and is persisted.
    pub fn cameras(&self) -> Vec<CameraEntry> {
        let devices = self.catalog.devices();
        let stored = self.store.get_string(CAMERA_UNIQUE_ID_KEY);
        let selected = resolve_device(stored.as_deref(), &devices).map(|d| d.unique_id().to_string());

        if let Some(id) = &selected {
            if stored.as_deref() != Some(id.as_str()) {
                tracing::debug!(camera = %id, "persisting default camera");
                persist_string(self.store.as_ref(), CAMERA_UNIQUE_ID_KEY, id);
            }
        }

        devices
            .into_iter()
            .map(|device| CameraEntry {
                selected: selected.as_deref() == Some(device.unique_id()),
                device,
            })
            .collect()
    }

    pub fn set_dock_render(&self, enabled: bool) {
        if self.render.icon_enabled() == enabled {
            return;
        }
        self.render.set_icon_enabled(enabled);
        persist_bool(self.store.as_ref(), DOCK_RENDER_ENABLED_KEY, enabled);
        self.publish(ControlEvent::DockRenderChanged { enabled });
    }

    pub fn dock_render(&self) -> bool {
        self.render.icon_enabled()
    }

    pub fn status(&self) -> Status {
        Status {
            enabled: self.is_enabled(),
            capture: self.capture.state(),
            camera: self.capture.device(),
            expression: self.capture.classifier().current(),
            dock_render: self.render.icon_enabled(),
        }
    }

    /// Stop capture and wait for the session to wind down.
    pub fn shutdown(&self) {
        self.capture.stop();
        self.capture.flush();
    }

    fn resolved_device(&self) -> Option<DeviceInfo> {
        let devices = self.catalog.devices();
        let stored = self.store.get_string(CAMERA_UNIQUE_ID_KEY);
        resolve_device(stored.as_deref(), &devices).cloned()
    }
}
