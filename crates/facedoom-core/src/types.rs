use serde::{Deserialize, Serialize};

/// Discrete face expression forwarded to the engine's status-bar face.
///
/// The discriminant is the engine wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Sentinel: face control is off, the engine animates the face itself.
    Disabled = -1,
    Neutral = 0,
    TurnRight = 1,
    TurnLeft = 2,
    Grin = 3,
    MouthOpen = 4,
    BrowRaiseLeft = 5,
    BrowRaiseRight = 6,
}

impl Expression {
    /// Engine wire value.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`code`](Self::code). Unknown values yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::Disabled,
            0 => Self::Neutral,
            1 => Self::TurnRight,
            2 => Self::TurnLeft,
            3 => Self::Grin,
            4 => Self::MouthOpen,
            5 => Self::BrowRaiseLeft,
            6 => Self::BrowRaiseRight,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Neutral => "neutral",
            Self::TurnRight => "turn-right",
            Self::TurnLeft => "turn-left",
            Self::Grin => "grin",
            Self::MouthOpen => "mouth-open",
            Self::BrowRaiseLeft => "brow-raise-left",
            Self::BrowRaiseRight => "brow-raise-right",
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A normalized landmark point. Both axes span 0.0–1.0 with the origin at
/// the bottom-left of the face region, so larger `y` is higher on the face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One face as reported by the landmark detector for a single camera frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceObservation {
    /// Head yaw in radians, if the detector estimated one.
    pub yaw: Option<f64>,
    pub outer_lips: Vec<Point>,
    pub left_eyebrow: Vec<Point>,
    pub right_eyebrow: Vec<Point>,
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
}

/// Axis-aligned bounds of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounds of `points`, or `None` for an empty set.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(points.iter().fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Mean `y` of a point set, or `None` for an empty set.
pub fn mean_y(points: &[Point]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64)
}
