//! `mantis-types` – shared value types for the Mantis control stack.
//!
//! Everything that crosses a crate boundary lives here: observed
//! [`Point`]s, robot [`Pose2D`]s, raw [`Detection`]s, the [`MotionCommand`]
//! issued to the drive base, and the [`MantisError`] returned by every call
//! into the external robot boundary.

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// A single position observation.
///
/// Coordinates are only meaningful relative to the frame the point was
/// produced in; the frame itself is not stored.  Transforming a point yields
/// a new value and never mutates the original.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Radial or depth magnitude reported by the sensor that produced the
    /// point, when known.
    pub distance: Option<f32>,
    /// `false` when the observation failed a sanity check (non-finite
    /// coordinates or depth).
    pub valid: bool,
}

impl Point {
    /// Create a point.  It is valid iff every coordinate is finite.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            distance: None,
            valid: x.is_finite() && y.is_finite() && z.is_finite(),
        }
    }

    /// A point on the ground plane (`z = 0`).
    pub fn planar(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0)
    }

    /// The frame origin.
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Attach the sensor distance.  A non-finite distance invalidates the
    /// point.
    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self.valid &= distance.is_finite();
        self
    }

    /// Mark the point as having failed a sanity check.
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_sq(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean norm of the ground-plane components.
    pub fn planar_norm(&self) -> f32 {
        self.x.hypot(self.y)
    }
}

/// Planar robot pose in the working frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    /// Heading, counter-clockwise from +X (radians).
    pub heading: f32,
}

impl Pose2D {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }
}

/// Normalise an angle into `(-π, π]`.
///
/// Angles already in range come back bit-for-bit unchanged.  Others are
/// computed as `((a + π) mod 2π) − π`, with the `−π` boundary folded onto
/// `+π`.
pub fn wrap_angle(angle: f32) -> f32 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Bearing from `(from_x, from_y)` towards `(to_x, to_y)`, in `(-π, π]`.
pub fn bearing(from_x: f32, from_y: f32, to_x: f32, to_y: f32) -> f32 {
    wrap_angle((to_y - from_y).atan2(to_x - from_x))
}

// ─────────────────────────────────────────────────────────────────────────────
// Perception records
// ─────────────────────────────────────────────────────────────────────────────

/// One object detection in image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub score: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

/// All detections from one camera frame, with the frame dimensions needed to
/// locate the image center.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

/// One horizontal row of a depth image, left to right (metres).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthRow {
    pub values: Vec<f32>,
}

impl DepthRow {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.values.len() as u32
    }
}

/// Result of a single-shot object localisation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sighting {
    /// The object was localised; the point is in the robot base frame.
    Seen(Point),
    /// Nothing usable this sample.  Callers retry.
    Missed,
    /// The source confirms no target is visible.  Callers give up.
    Absent,
}

// ─────────────────────────────────────────────────────────────────────────────
// Motion
// ─────────────────────────────────────────────────────────────────────────────

/// Sign of a single motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    /// Sign of `value`; `0.0` and NaN map to [`Sign::Zero`].
    pub fn of(value: f32) -> Self {
        if value > 0.0 {
            Sign::Positive
        } else if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            Sign::Negative => -1.0,
            Sign::Zero => 0.0,
            Sign::Positive => 1.0,
        }
    }
}

/// Velocity command for the drive base.
///
/// Each axis is keyed only by its sign; the magnitude is fixed by the base
/// (normal or high linear speed, a single turn rate).  A [`Sign::Zero`] axis
/// stops that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Forward (`Positive`) or backward (`Negative`) travel.
    pub direction: Sign,
    /// Counter-clockwise (`Positive`) or clockwise (`Negative`) rotation.
    pub turn: Sign,
    pub high_speed: bool,
}

impl MotionCommand {
    /// Zero velocity on both axes.
    pub fn stop() -> Self {
        Self {
            direction: Sign::Zero,
            turn: Sign::Zero,
            high_speed: false,
        }
    }

    /// Straight-line travel in the direction of `direction`.
    pub fn walk(direction: Sign, high_speed: bool) -> Self {
        Self {
            direction,
            turn: Sign::Zero,
            high_speed,
        }
    }

    /// Rotation in place.
    pub fn turn(turn: Sign) -> Self {
        Self {
            direction: Sign::Zero,
            turn,
            high_speed: false,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.direction == Sign::Zero && self.turn == Sign::Zero
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure of a call into the robot boundary.  Fatal to the current
/// controller invocation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MantisError {
    #[error("Transform Unavailable: {source_frame} -> {target_frame}")]
    TransformUnavailable {
        target_frame: String,
        source_frame: String,
    },

    #[error("Sensor Unavailable on {sensor}: {details}")]
    SensorUnavailable { sensor: String, details: String },

    #[error("Motion Fault: {0}")]
    MotionFault(String),

    #[error("Unknown Named Position: {0}")]
    UnknownPosition(String),
}
