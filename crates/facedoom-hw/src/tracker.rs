//! Face landmark source backed by an OpenSeeFace tracker process.
//!
//! The tracker owns the camera and streams one UDP packet per frame,
//! 1785 bytes per tracked face, little-endian:
//!
//!   f64 time | i32 face_id | 2×f32 resolution | 2×f32 eye open | u8 got_3d
//!   | f32 fit_error | 4×f32 quaternion | 3×f32 euler (pitch, yaw, roll, degrees)
//!   | 3×f32 translation | 68×f32 confidence | 68×(f32 y, f32 x) landmarks
//!   | 70×3×f32 3D points | 14×f32 features
//!
//! Only the euler angles and the 2D landmarks are read.

use crate::camera::DeviceInfo;
use facedoom_core::{FaceObservation, Point};
use std::net::UdpSocket;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

pub const FACE_PACKET_SIZE: usize = 1785;
pub const NUM_LANDMARKS: usize = 68;
const FACE_ID_OFFSET: usize = 8;
const EULER_OFFSET: usize = 49;
const LANDMARKS_OFFSET: usize = 345;

// iBUG 68-point layout, named from the subject's point of view.
const RIGHT_EYEBROW: std::ops::RangeInclusive<usize> = 17..=21;
const LEFT_EYEBROW: std::ops::RangeInclusive<usize> = 22..=26;
const RIGHT_EYE: std::ops::RangeInclusive<usize> = 36..=41;
const LEFT_EYE: std::ops::RangeInclusive<usize> = 42..=47;
const OUTER_LIPS: std::ops::RangeInclusive<usize> = 48..=59;

/// Receive timeout; bounds how long `stop` waits for the receiver thread.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("packet too short: need {FACE_PACKET_SIZE} bytes, got {0}")]
    ShortPacket(usize),
    #[error("device {0} has no /dev/videoN index")]
    UnsupportedDevice(String),
    #[error("failed to bind tracker socket: {0}")]
    Bind(std::io::Error),
    #[error("failed to launch tracker '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to spawn receiver thread: {0}")]
    Thread(std::io::Error),
}

/// Callback invoked on the receiver thread for every observed face.
pub type ObservationCallback = Box<dyn FnMut(FaceObservation) + Send + 'static>;

/// A running supplier of face observations for one camera.
pub trait LandmarkSource: Send {
    /// Begin delivering observations from `device`. Starting an already
    /// running source is a no-op.
    fn start(&mut self, device: &DeviceInfo, on_observation: ObservationCallback) -> Result<(), TrackerError>;

    /// Stop delivering. Returns once no further callbacks will run.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// One face decoded from a tracker packet.
#[derive(Debug, Clone)]
pub struct TrackedFace {
    pub face_id: i32,
    /// Pitch, yaw, roll in degrees.
    pub euler: [f32; 3],
    /// Image-space landmarks (x, y), origin top-left.
    pub landmarks: Vec<(f32, f32)>,
}

fn f32_at(buf: &[u8], offset: usize) -> f32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    f32::from_le_bytes(bytes)
}

/// Decode the first face of a packet.
pub fn parse_face(buf: &[u8]) -> Result<TrackedFace, TrackerError> {
    if buf.len() < FACE_PACKET_SIZE {
        return Err(TrackerError::ShortPacket(buf.len()));
    }

    let mut id = [0u8; 4];
    id.copy_from_slice(&buf[FACE_ID_OFFSET..FACE_ID_OFFSET + 4]);
    let face_id = i32::from_le_bytes(id);

    let euler = [
        f32_at(buf, EULER_OFFSET),
        f32_at(buf, EULER_OFFSET + 4),
        f32_at(buf, EULER_OFFSET + 8),
    ];

    // Each point is sent as (y, x).
    let landmarks = (0..NUM_LANDMARKS)
        .map(|i| {
            let at = LANDMARKS_OFFSET + i * 8;
            (f32_at(buf, at + 4), f32_at(buf, at))
        })
        .collect();

    Ok(TrackedFace {
        face_id,
        euler,
        landmarks,
    })
}

impl TrackedFace {
    /// Convert to an observation: yaw in radians, landmarks normalized to
    /// the face's landmark bounds with the origin at the bottom-left.
    pub fn to_observation(&self) -> FaceObservation {
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for &(x, y) in &self.landmarks {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let span_x = f64::from((max_x - min_x).max(f32::EPSILON));
        let span_y = f64::from((max_y - min_y).max(f32::EPSILON));

        let points = |range: std::ops::RangeInclusive<usize>| -> Vec<Point> {
            range
                .filter_map(|i| self.landmarks.get(i))
                .map(|&(x, y)| {
                    Point::new(
                        f64::from(x - min_x) / span_x,
                        1.0 - f64::from(y - min_y) / span_y,
                    )
                })
                .collect()
        };

        FaceObservation {
            yaw: Some(f64::from(self.euler[1]).to_radians()),
            outer_lips: points(OUTER_LIPS),
            left_eyebrow: points(LEFT_EYEBROW),
            right_eyebrow: points(RIGHT_EYEBROW),
            left_eye: points(LEFT_EYE),
            right_eye: points(RIGHT_EYE),
        }
    }
}

/// How to launch and reach the tracker process.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Executable, e.g. `python3` or a packaged `facetracker` binary.
    pub program: String,
    /// Script passed as the first argument, if `program` is an interpreter.
    pub script: Option<String>,
    pub address: String,
    pub port: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            program: "facetracker".into(),
            script: None,
            address: "127.0.0.1".into(),
            port: 11573,
        }
    }
}

/// OpenSeeFace `facetracker` subprocess plus a UDP receiver thread.
pub struct OsfTracker {
    config: TrackerConfig,
    child: Option<Child>,
    receiver: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl OsfTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            child: None,
            receiver: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawn_process(&self, camera_index: u32) -> Result<Child, TrackerError> {
        let mut cmd = Command::new(&self.config.program);
        if let Some(script) = &self.config.script {
            cmd.arg(script);
        }
        cmd.args(["-v", "0"])
            .args(["-s", "1"])
            .args(["--max-faces", "1"])
            .args(["--ip", &self.config.address])
            .args(["--port", &self.config.port.to_string()])
            .args(["--capture", &camera_index.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| TrackerError::Spawn {
                program: self.config.program.clone(),
                source,
            })
    }
}

impl LandmarkSource for OsfTracker {
    fn start(&mut self, device: &DeviceInfo, mut on_observation: ObservationCallback) -> Result<(), TrackerError> {
        if self.is_running() {
            return Ok(());
        }
        let index = device
            .index()
            .ok_or_else(|| TrackerError::UnsupportedDevice(device.path.clone()))?;

        let socket = UdpSocket::bind((self.config.address.as_str(), self.config.port))
            .map_err(TrackerError::Bind)?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .map_err(TrackerError::Bind)?;

        let mut child = self.spawn_process(index)?;
        tracing::info!(
            pid = child.id(),
            camera = %device.path,
            port = self.config.port,
            "tracker started"
        );

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let spawned = std::thread::Builder::new()
            .name("facedoom-capture".into())
            .spawn(move || {
                let mut buf = vec![0u8; 65536];
                while running.load(Ordering::SeqCst) {
                    match socket.recv(&mut buf) {
                        Ok(n) => match parse_face(&buf[..n]) {
                            Ok(face) => {
                                if running.load(Ordering::SeqCst) {
                                    on_observation(face.to_observation());
                                }
                            }
                            Err(e) => tracing::trace!(error = %e, "dropping tracker packet"),
                        },
                        Err(e)
                            if matches!(
                                e.kind(),
                                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                            ) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "tracker socket failed; no more observations");
                            break;
                        }
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                self.child = Some(child);
                self.receiver = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = child.kill();
                let _ = child.wait();
                Err(TrackerError::Thread(e))
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut child) = self.child.take() {
            tracing::info!(pid = child.id(), "stopping tracker");
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.receiver.take() {
            if handle.join().is_err() {
                tracing::warn!("tracker receiver thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for OsfTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build one face packet with the given yaw and image-space landmarks.
    fn build_packet(face_id: i32, yaw_deg: f32, landmarks: &[(f32, f32)]) -> Vec<u8> {
        let mut buf = vec![0u8; FACE_PACKET_SIZE];
        buf[FACE_ID_OFFSET..FACE_ID_OFFSET + 4].copy_from_slice(&face_id.to_le_bytes());
        buf[EULER_OFFSET + 4..EULER_OFFSET + 8].copy_from_slice(&yaw_deg.to_le_bytes());
        for (i, &(x, y)) in landmarks.iter().enumerate().take(NUM_LANDMARKS) {
            let at = LANDMARKS_OFFSET + i * 8;
            buf[at..at + 4].copy_from_slice(&y.to_le_bytes());
            buf[at + 4..at + 8].copy_from_slice(&x.to_le_bytes());
        }
        buf
    }

    /// 68 points inside a 100×100 face at (200, 100), lips 40 wide, 10 tall.
    fn face_landmarks() -> Vec<(f32, f32)> {
        let mut points = vec![(250.0, 150.0); NUM_LANDMARKS];
        // Jaw spans the full face box.
        points[0] = (200.0, 100.0);
        points[16] = (300.0, 200.0);
        for (n, i) in OUTER_LIPS.enumerate() {
            let x = 230.0 + (n % 6) as f32 * 8.0;
            let y = if n < 6 { 170.0 } else { 180.0 };
            points[i] = (x, y);
        }
        points
    }

    #[test]
    fn test_parse_reads_yaw_and_swapped_points() {
        let packet = build_packet(3, 12.5, &face_landmarks());
        let face = parse_face(&packet).unwrap();
        assert_eq!(face.face_id, 3);
        assert_eq!(face.euler[1], 12.5);
        assert_eq!(face.landmarks.len(), NUM_LANDMARKS);
        assert_eq!(face.landmarks[0], (200.0, 100.0));
        assert_eq!(face.landmarks[16], (300.0, 200.0));
    }

    #[test]
    fn test_parse_short_packet() {
        let err = parse_face(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, TrackerError::ShortPacket(100)));
    }

    #[test]
    fn test_parse_takes_first_of_many_faces() {
        let mut packet = build_packet(1, 0.0, &face_landmarks());
        packet.extend(build_packet(2, 0.0, &face_landmarks()));
        assert_eq!(parse_face(&packet).unwrap().face_id, 1);
    }

    #[test]
    fn test_observation_normalized_to_face() {
        let face = parse_face(&build_packet(0, 0.0, &face_landmarks())).unwrap();
        let obs = face.to_observation();

        assert_eq!(obs.yaw, Some(0.0));
        assert_eq!(obs.outer_lips.len(), 12);
        assert_eq!(obs.left_eyebrow.len(), 5);
        assert_eq!(obs.right_eye.len(), 6);

        let lips = facedoom_core::BoundingBox::enclosing(&obs.outer_lips).unwrap();
        assert!((lips.width() - 0.40).abs() < 1e-6, "width {}", lips.width());
        assert!((lips.height() - 0.10).abs() < 1e-6, "height {}", lips.height());
        // Lips sit in the lower half once y points up.
        assert!(lips.max_y < 0.5);
    }

    #[test]
    fn test_yaw_converted_to_radians() {
        let face = parse_face(&build_packet(0, 90.0, &face_landmarks())).unwrap();
        let yaw = face.to_observation().yaw.unwrap();
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_start_rejects_non_video_node() {
        let mut tracker = OsfTracker::new(TrackerConfig::default());
        let device = DeviceInfo {
            path: "/dev/media0".into(),
            name: "Cam".into(),
            driver: "uvcvideo".into(),
            bus: "usb-1".into(),
        };
        let err = tracker.start(&device, Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, TrackerError::UnsupportedDevice(_)));
        assert!(!tracker.is_running());
    }
}
