use crate::sink::SignalSink;
use facedoom_shell::{ControlError, FaceControl, RenderCoordinator};
use std::sync::Arc;
use zbus::interface;
use zbus::object_server::SignalEmitter;

pub const BUS_NAME: &str = "org.facedoom.FaceControl1";
pub const OBJECT_PATH: &str = "/org/facedoom/FaceControl1";

/// D-Bus interface for the facedoom face control daemon.
///
/// Bus name: org.facedoom.FaceControl1
/// Object path: /org/facedoom/FaceControl1
pub struct FaceControlService {
    control: Arc<FaceControl>,
    render: Arc<RenderCoordinator>,
    sink: Arc<SignalSink>,
}

impl FaceControlService {
    pub fn new(control: Arc<FaceControl>, render: Arc<RenderCoordinator>, sink: Arc<SignalSink>) -> Self {
        Self {
            control,
            render,
            sink,
        }
    }
}

fn control_error(e: ControlError) -> zbus::fdo::Error {
    match e {
        ControlError::CameraAccessDenied(_) => zbus::fdo::Error::AccessDenied(format!(
            "Camera Access Required: {e}"
        )),
        ControlError::UnknownCamera(_) => zbus::fdo::Error::InvalidArgs(e.to_string()),
    }
}

/// Run settings and device work off the bus executor.
async fn blocking<T, F>(job: F) -> zbus::fdo::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| zbus::fdo::Error::Failed(format!("worker task failed: {e}")))
}

#[interface(name = "org.facedoom.FaceControl1")]
impl FaceControlService {
    /// Turn face control on or off. Fails with AccessDenied when the
    /// camera cannot be opened.
    async fn set_enabled(&self, enabled: bool) -> zbus::fdo::Result<()> {
        tracing::info!(enabled, "set_enabled requested");
        let control = Arc::clone(&self.control);
        blocking(move || control.set_enabled(enabled, true))
            .await?
            .map_err(control_error)
    }

    async fn enabled(&self) -> bool {
        self.control.is_enabled()
    }

    /// JSON array of cameras with the effective selection marked.
    async fn list_cameras(&self) -> zbus::fdo::Result<String> {
        let control = Arc::clone(&self.control);
        let cameras = blocking(move || control.cameras()).await?;
        serde_json::to_string(&cameras).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    async fn select_camera(&self, unique_id: String) -> zbus::fdo::Result<()> {
        tracing::info!(unique_id = %unique_id, "select_camera requested");
        let control = Arc::clone(&self.control);
        blocking(move || control.select_camera(&unique_id))
            .await?
            .map_err(control_error)
    }

    async fn set_dock_render(&self, enabled: bool) -> zbus::fdo::Result<()> {
        tracing::info!(enabled, "set_dock_render requested");
        let control = Arc::clone(&self.control);
        blocking(move || control.set_dock_render(enabled)).await
    }

    /// Called by the engine host when its window is minimized or restored.
    async fn set_window_minimized(&self, minimized: bool) {
        tracing::debug!(minimized, "window state changed");
        self.render.set_window_minimized(minimized);
    }

    /// One RGBA engine frame at 640×400. Dropped unless the dock icon is
    /// being rendered.
    async fn present_frame(&self, data: Vec<u8>) {
        self.render.frame_ready(&data);
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let control = Arc::clone(&self.control);
        let status = blocking(move || control.status()).await?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "face_control": status,
            "last_expression": self.sink.last(),
        })
        .to_string())
    }

    /// Every expression code delivered to the engine.
    #[zbus(signal)]
    pub async fn expression_changed(emitter: &SignalEmitter<'_>, code: i32) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn state_changed(emitter: &SignalEmitter<'_>, enabled: bool) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn camera_changed(emitter: &SignalEmitter<'_>, unique_id: &str) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn dock_render_changed(emitter: &SignalEmitter<'_>, enabled: bool) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blocking_runs_off_the_executor_thread() {
        let caller = std::thread::current().id();
        let worker = blocking(|| std::thread::current().id()).await.unwrap();
        assert_ne!(caller, worker);
    }

    #[test]
    fn test_access_denied_maps_to_fdo_error() {
        let err = control_error(ControlError::CameraAccessDenied("/dev/video0".into()));
        assert!(matches!(err, zbus::fdo::Error::AccessDenied(msg) if msg.starts_with("Camera Access Required")));
        let err = control_error(ControlError::UnknownCamera("usb-9".into()));
        assert!(matches!(err, zbus::fdo::Error::InvalidArgs(_)));
    }
}
