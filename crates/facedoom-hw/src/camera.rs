//! V4L2 camera discovery, default-device resolution and access checks.

use nix::unistd::{access, AccessFlags};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use v4l::prelude::*;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Info about a discovered V4L2 capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

impl DeviceInfo {
    /// Identifier that survives re-enumeration: the bus location, or the
    /// device path for drivers that report no bus.
    pub fn unique_id(&self) -> &str {
        if self.bus.is_empty() {
            &self.path
        } else {
            &self.bus
        }
    }

    /// Numeric index of a `/dev/videoN` node.
    pub fn index(&self) -> Option<u32> {
        Path::new(&self.path)
            .file_name()?
            .to_str()?
            .strip_prefix("video")?
            .parse()
            .ok()
    }
}

/// Source of the current camera list.
pub trait DeviceCatalog: Send + Sync {
    /// Capture devices sorted by name.
    fn devices(&self) -> Vec<DeviceInfo>;
}

/// Enumerates `/dev/video0` … `/dev/video15`.
pub struct V4lCatalog;

impl DeviceCatalog for V4lCatalog {
    fn devices(&self) -> Vec<DeviceInfo> {
        list_devices()
    }
}

/// List available V4L2 video capture devices, sorted by name.
pub fn list_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for i in 0..16 {
        let path = format!("/dev/video{i}");
        if !Path::new(&path).exists() {
            continue;
        }
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        // UVC cameras expose a second metadata node per device; skip it.
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            continue;
        }
        devices.push(DeviceInfo {
            path,
            name: caps.card.clone(),
            driver: caps.driver.clone(),
            bus: caps.bus.clone(),
        });
    }

    sort_devices(&mut devices);
    tracing::debug!(count = devices.len(), "enumerated cameras");
    devices
}

pub fn sort_devices(devices: &mut [DeviceInfo]) {
    devices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
}

/// The device to capture from: the preferred one if it is still present,
/// otherwise the default.
pub fn resolve_device<'a>(preferred: Option<&str>, devices: &'a [DeviceInfo]) -> Option<&'a DeviceInfo> {
    if let Some(id) = preferred {
        if let Some(found) = devices.iter().find(|d| d.unique_id() == id) {
            return Some(found);
        }
    }
    default_device(devices)
}

/// First device of the (name-sorted) list.
pub fn default_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices.first()
}

/// Whether this process may open a camera node for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Denied,
}

/// Check read/write access to a device node.
pub fn check_access(device_path: &str) -> Result<(), CameraError> {
    if !Path::new(device_path).exists() {
        return Err(CameraError::DeviceNotFound(device_path.to_string()));
    }
    access(device_path, AccessFlags::R_OK | AccessFlags::W_OK)
        .map_err(|e| CameraError::PermissionDenied(format!("{device_path}: {e}")))
}

/// Decides whether camera capture is allowed.
pub trait CameraAccess: Send + Sync {
    fn authorization(&self, device: &DeviceInfo) -> Authorization;
}

/// Filesystem permission check on the device node.
pub struct NodeAccess;

impl CameraAccess for NodeAccess {
    fn authorization(&self, device: &DeviceInfo) -> Authorization {
        match check_access(&device.path) {
            Ok(()) => Authorization::Authorized,
            // A vanished node is a discovery problem, not a permission one.
            Err(CameraError::DeviceNotFound(_)) => Authorization::Authorized,
            Err(e) => {
                tracing::warn!(error = %e, "camera access denied");
                Authorization::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(path: &str, name: &str, bus: &str) -> DeviceInfo {
        DeviceInfo {
            path: path.into(),
            name: name.into(),
            driver: "uvcvideo".into(),
            bus: bus.into(),
        }
    }

    #[test]
    fn test_unique_id_prefers_bus() {
        assert_eq!(device("/dev/video0", "Cam", "usb-1").unique_id(), "usb-1");
        assert_eq!(device("/dev/video0", "Cam", "").unique_id(), "/dev/video0");
    }

    #[test]
    fn test_index_from_path() {
        assert_eq!(device("/dev/video4", "Cam", "").index(), Some(4));
        assert_eq!(device("/dev/media0", "Cam", "").index(), None);
    }

    #[test]
    fn test_sort_by_name() {
        let mut devices = vec![
            device("/dev/video2", "Webcam", "usb-2"),
            device("/dev/video0", "Integrated", "usb-1"),
        ];
        sort_devices(&mut devices);
        assert_eq!(devices[0].name, "Integrated");
    }

    #[test]
    fn test_resolve_preferred() {
        let devices = vec![
            device("/dev/video0", "A", "usb-1"),
            device("/dev/video2", "B", "usb-2"),
        ];
        let found = resolve_device(Some("usb-2"), &devices).unwrap();
        assert_eq!(found.path, "/dev/video2");
    }

    #[test]
    fn test_resolve_missing_preferred_falls_back() {
        let devices = vec![
            device("/dev/video0", "A", "usb-1"),
            device("/dev/video2", "B", "usb-2"),
        ];
        let found = resolve_device(Some("usb-9"), &devices).unwrap();
        assert_eq!(found.path, "/dev/video0");
        assert_eq!(resolve_device(None, &devices).unwrap().path, "/dev/video0");
    }

    #[test]
    fn test_resolve_empty() {
        assert!(resolve_device(Some("usb-1"), &[]).is_none());
    }

    #[test]
    fn test_check_access_missing_node() {
        let err = check_access("/dev/facedoom-does-not-exist").unwrap_err();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }
}
