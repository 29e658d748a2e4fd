//! Capture session lifecycle.
//!
//! Owns the landmark source and feeds the expression classifier. All
//! lifecycle work runs on the capture queue; classification runs on the
//! detection queue; the source's own thread only counts frames and hands
//! every third observation over.

use crate::queue::SerialQueue;
use facedoom_core::{ExpressionClassifier, FaceObservation, FrameDecimator};
use facedoom_hw::camera::{resolve_device, DeviceCatalog, DeviceInfo};
use facedoom_hw::{LandmarkSource, ObservationCallback};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
}

struct Session {
    state: SessionState,
    preferred: Option<String>,
    device: Option<DeviceInfo>,
}

type SharedSource = Arc<Mutex<Box<dyn LandmarkSource>>>;

/// Clone-safe handle to the capture session.
///
/// The session mutex only guards state transitions; the source has its
/// own lock and is driven exclusively from the capture queue, so readers
/// of `state()` never wait on device work.
#[derive(Clone)]
pub struct CaptureSession {
    session: Arc<Mutex<Session>>,
    source: SharedSource,
    catalog: Arc<dyn DeviceCatalog>,
    classifier: Arc<ExpressionClassifier>,
    capture_queue: SerialQueue,
    detection_queue: SerialQueue,
    detection_interval: u32,
}

impl CaptureSession {
    pub fn new(
        source: Box<dyn LandmarkSource>,
        catalog: Arc<dyn DeviceCatalog>,
        classifier: Arc<ExpressionClassifier>,
        detection_interval: u32,
    ) -> std::io::Result<Self> {
        Ok(Self {
            session: Arc::new(Mutex::new(Session {
                state: SessionState::Stopped,
                preferred: None,
                device: None,
            })),
            source: Arc::new(Mutex::new(source)),
            catalog,
            classifier,
            capture_queue: SerialQueue::new("facedoom-session")?,
            detection_queue: SerialQueue::new("facedoom-detection")?,
            detection_interval,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_source(&self) -> MutexGuard<'_, Box<dyn LandmarkSource>> {
        self.source.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Device currently being captured from, if running.
    pub fn device(&self) -> Option<DeviceInfo> {
        self.lock().device.clone()
    }

    pub fn classifier(&self) -> &Arc<ExpressionClassifier> {
        &self.classifier
    }

    /// Begin capturing. The classifier is enabled immediately; the source
    /// is brought up on the capture queue. A no-op if already started.
    pub fn start(&self) {
        self.classifier.enable();
        let this = self.clone();
        self.capture_queue.dispatch(move || {
            if this.state() != SessionState::Stopped {
                return;
            }
            this.configure_and_start();
        });
    }

    /// Stop capturing. The classifier is disabled immediately (emitting the
    /// disabled sentinel once); the source is torn down on the capture queue.
    pub fn stop(&self) {
        self.classifier.disable();
        let this = self.clone();
        self.capture_queue.dispatch(move || {
            if this.state() == SessionState::Stopped {
                return;
            }
            this.teardown();
            tracing::info!("capture stopped");
        });
    }

    /// Record the camera preference. A running session is torn down and
    /// rebuilt on the new device; observations in between are lost.
    pub fn set_preferred_camera(&self, unique_id: Option<String>) {
        let this = self.clone();
        self.capture_queue.dispatch(move || {
            let running = {
                let mut session = this.lock();
                session.preferred = unique_id;
                session.state == SessionState::Running
            };
            if running {
                tracing::info!("camera preference changed; reconfiguring capture");
                this.teardown();
                this.configure_and_start();
            }
        });
    }

    /// Wait until every lifecycle job queued so far has run.
    pub fn flush(&self) {
        self.capture_queue.sync(|| ());
        self.detection_queue.sync(|| ());
    }

    // Runs on the capture queue.
    fn teardown(&self) {
        self.lock_source().stop();
        let mut session = self.lock();
        session.state = SessionState::Stopped;
        session.device = None;
    }

    // Runs on the capture queue.
    fn configure_and_start(&self) {
        let preferred = {
            let mut session = self.lock();
            session.state = SessionState::Starting;
            session.preferred.clone()
        };

        let devices = self.catalog.devices();
        let Some(device) = resolve_device(preferred.as_deref(), &devices).cloned() else {
            tracing::warn!("no camera available; face control inactive");
            self.lock().state = SessionState::Stopped;
            return;
        };

        let classifier = Arc::clone(&self.classifier);
        let detection = self.detection_queue.clone();
        let mut decimator = FrameDecimator::new(self.detection_interval);
        let on_observation: ObservationCallback = Box::new(move |face: FaceObservation| {
            if !classifier.is_enabled() || !decimator.tick() {
                return;
            }
            let classifier = Arc::clone(&classifier);
            detection.dispatch(move || {
                classifier.observe(&face, Instant::now());
            });
        });

        let result = self.lock_source().start(&device, on_observation);

        let mut session = self.lock();
        match result {
            Ok(()) => {
                tracing::info!(camera = %device.name, path = %device.path, "capture running");
                session.state = SessionState::Running;
                session.device = Some(device);
            }
            Err(e) => {
                tracing::warn!(camera = %device.name, error = %e, "failed to start capture");
                session.state = SessionState::Stopped;
            }
        }
    }
}
