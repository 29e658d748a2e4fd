//! Face expression classification from landmark geometry.
//!
//! [`classify`] is a pure function of one observation. [`HysteresisGate`]
//! suppresses flicker between expressions, [`FrameDecimator`] thins the
//! camera stream, and [`ExpressionClassifier`] ties them to an engine sink.

use crate::engine::ExpressionSink;
use crate::types::{mean_y, BoundingBox, Expression, FaceObservation};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

// --- Geometric thresholds (normalized landmark space) ---
const YAW_THRESHOLD_RAD: f64 = 0.18;
const LIPS_MIN_POINTS: usize = 6;
const MOUTH_OPEN_MIN_HEIGHT: f64 = 0.10;
const MOUTH_OPEN_MIN_RATIO: f64 = 0.42;
const BROW_RAISE_DELTA: f64 = 0.04;
const GRIN_MIN_WIDTH: f64 = 0.36;
const GRIN_MIN_RATIO: f64 = 3.8;
const RATIO_EPSILON: f64 = 0.001;

/// Minimum time between accepted expression changes.
pub const HYSTERESIS: Duration = Duration::from_millis(200);

/// Classify every Nth camera frame.
pub const DETECTION_INTERVAL: u32 = 3;

/// Map one observation to an expression. First matching rule wins:
/// head turn, open mouth, one-sided brow raise, grin, neutral.
pub fn classify(face: &FaceObservation) -> Expression {
    if let Some(yaw) = face.yaw {
        if yaw.abs() > YAW_THRESHOLD_RAD {
            return if yaw > 0.0 {
                Expression::TurnRight
            } else {
                Expression::TurnLeft
            };
        }
    }

    let lips = lip_box(face);

    if lips.is_some_and(is_mouth_open) {
        return Expression::MouthOpen;
    }

    if let Some(brow) = brow_raise(face) {
        return brow;
    }

    if lips.is_some_and(is_grinning) {
        return Expression::Grin;
    }

    Expression::Neutral
}

/// Outer-lip bounds, if there are enough points for a meaningful box with
/// non-zero extent on both axes.
fn lip_box(face: &FaceObservation) -> Option<BoundingBox> {
    if face.outer_lips.len() < LIPS_MIN_POINTS {
        return None;
    }
    let b = BoundingBox::enclosing(&face.outer_lips)?;
    (b.width() > 0.0 && b.height() > 0.0).then_some(b)
}

fn is_mouth_open(lips: BoundingBox) -> bool {
    let ratio = lips.height() / lips.width().max(RATIO_EPSILON);
    lips.height() > MOUTH_OPEN_MIN_HEIGHT && ratio > MOUTH_OPEN_MIN_RATIO
}

fn is_grinning(lips: BoundingBox) -> bool {
    let ratio = lips.width() / lips.height().max(RATIO_EPSILON);
    lips.width() > GRIN_MIN_WIDTH && ratio > GRIN_MIN_RATIO
}

fn brow_raise(face: &FaceObservation) -> Option<Expression> {
    let left_gap = mean_y(&face.left_eyebrow)? - mean_y(&face.left_eye)?;
    let right_gap = mean_y(&face.right_eyebrow)? - mean_y(&face.right_eye)?;
    let delta = left_gap - right_gap;

    if delta > BROW_RAISE_DELTA {
        Some(Expression::BrowRaiseLeft)
    } else if delta < -BROW_RAISE_DELTA {
        Some(Expression::BrowRaiseRight)
    } else {
        None
    }
}

/// Holds the last accepted expression and when it last changed.
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    held: Expression,
    changed_at: Option<Instant>,
    window: Duration,
}

impl Default for HysteresisGate {
    fn default() -> Self {
        Self::new(HYSTERESIS)
    }
}

impl HysteresisGate {
    pub fn new(window: Duration) -> Self {
        Self {
            held: Expression::Disabled,
            changed_at: None,
            window,
        }
    }

    pub fn held(&self) -> Expression {
        self.held
    }

    /// Decide what to emit for `candidate` observed at `now`.
    ///
    /// Re-confirming the held value refreshes the change instant. A
    /// different value inside the window is rejected and the held value
    /// is returned instead. A fresh gate accepts anything.
    pub fn admit(&mut self, candidate: Expression, now: Instant) -> Expression {
        if candidate == self.held {
            self.changed_at = Some(now);
            return candidate;
        }

        if let Some(at) = self.changed_at {
            if now.saturating_duration_since(at) < self.window {
                return self.held;
            }
        }

        self.held = candidate;
        self.changed_at = Some(now);
        candidate
    }

    pub fn reset(&mut self) {
        self.held = Expression::Disabled;
        self.changed_at = None;
    }
}

/// Passes every `interval`th tick.
#[derive(Debug, Clone)]
pub struct FrameDecimator {
    counter: u32,
    interval: u32,
}

impl FrameDecimator {
    pub fn new(interval: u32) -> Self {
        Self {
            counter: 0,
            interval: interval.max(1),
        }
    }

    pub fn tick(&mut self) -> bool {
        self.counter = (self.counter + 1) % self.interval;
        self.counter == 0
    }
}

impl Default for FrameDecimator {
    fn default() -> Self {
        Self::new(DETECTION_INTERVAL)
    }
}

struct ClassifierState {
    enabled: bool,
    gate: HysteresisGate,
}

/// Classifier bound to an engine sink, with an enable switch.
///
/// The enabled check and the sink call happen under one lock, so once
/// [`disable`](Self::disable) returns nothing but the sentinel has been
/// emitted, even by work that was already in flight.
pub struct ExpressionClassifier {
    state: Mutex<ClassifierState>,
    sink: Arc<dyn ExpressionSink>,
}

impl ExpressionClassifier {
    pub fn new(sink: Arc<dyn ExpressionSink>) -> Self {
        Self::with_window(sink, HYSTERESIS)
    }

    pub fn with_window(sink: Arc<dyn ExpressionSink>, window: Duration) -> Self {
        Self {
            state: Mutex::new(ClassifierState {
                enabled: false,
                gate: HysteresisGate::new(window),
            }),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClassifierState> {
        // State is two plain fields; a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Start accepting observations. Returns false if already enabled.
    pub fn enable(&self) -> bool {
        let mut state = self.lock();
        if state.enabled {
            return false;
        }
        state.enabled = true;
        state.gate.reset();
        tracing::debug!("expression classifier enabled");
        true
    }

    /// Stop accepting observations and emit the disabled sentinel once.
    /// Returns false (and emits nothing) if already disabled.
    pub fn disable(&self) -> bool {
        let mut state = self.lock();
        if !state.enabled {
            return false;
        }
        state.enabled = false;
        state.gate.reset();
        self.sink.set_face_expression(Expression::Disabled.code());
        tracing::debug!("expression classifier disabled");
        true
    }

    /// Expression currently held by the gate.
    pub fn current(&self) -> Expression {
        self.lock().gate.held()
    }

    /// Classify `face` and forward the gated result to the sink.
    ///
    /// Returns the emitted expression, or `None` when disabled.
    pub fn observe(&self, face: &FaceObservation, now: Instant) -> Option<Expression> {
        if !self.is_enabled() {
            return None;
        }
        let candidate = classify(face);

        let mut state = self.lock();
        if !state.enabled {
            return None;
        }
        let emitted = state.gate.admit(candidate, now);
        self.sink.set_face_expression(emitted.code());
        if emitted != candidate {
            tracing::trace!(%candidate, held = %emitted, "expression change suppressed");
        }
        Some(emitted)
    }
}
