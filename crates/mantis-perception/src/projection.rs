//! Pixel-to-metric back-projection.
//!
//! Two camera models are provided:
//!
//! - [`BaselineProjection`] – a simplified pinhole approximation that uses a
//!   fixed "baseline in pixels" in place of a calibrated focal length.  It is
//!   intentionally approximate: the constant was tuned on the robot and is
//!   kept as-is to preserve that calibration.  It maps a single image column
//!   plus a depth sample to a robot-centric `(forward, lateral)` offset.
//! - [`CameraIntrinsics`] – the standard pinhole model with focal lengths and
//!   optical center, mapping `(u, v, depth)` into the camera optical frame.
//!
//! # Example
//!
//! ```rust
//! use mantis_perception::projection::pixel_to_offset;
//!
//! // A pixel on the vertical center line is straight ahead.
//! let off = pixel_to_offset(320.0, 1.2, 640);
//! assert!(off.lateral.abs() < 1e-6);
//! assert!((off.forward - 1.2).abs() < 1e-5);
//! ```

use mantis_types::Point;
use serde::{Deserialize, Serialize};

/// Baseline length in pixels used by the fixed-baseline model.
pub const DEFAULT_BASELINE_PX: f32 = 500.0;

/// Robot-centric planar offset produced by [`BaselineProjection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarOffset {
    /// Distance along the optical axis (metres).
    pub forward: f32,
    /// Horizontal displacement, positive to the left of the image center.
    pub lateral: f32,
}

impl PlanarOffset {
    /// The offset as a point on the ground plane (`x` forward, `y` left).
    pub fn to_point(self) -> Point {
        Point::planar(self.forward, self.lateral)
    }

    /// Angle of the offset relative to straight ahead.
    pub fn bearing(self) -> f32 {
        self.lateral.atan2(self.forward)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixed-baseline model
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-baseline camera approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineProjection {
    pub baseline_px: f32,
}

impl Default for BaselineProjection {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_PX)
    }
}

impl BaselineProjection {
    pub fn new(baseline_px: f32) -> Self {
        Self { baseline_px }
    }

    /// Convert a column index and depth sample into a planar offset.
    ///
    /// ```text
    /// pixel_offset = image_width / 2 − pixel_col
    /// scale        = depth / sqrt(pixel_offset² + B²)
    /// lateral      = pixel_offset · scale · 2
    /// forward      = B · scale
    /// ```
    pub fn offset(&self, pixel_col: f32, depth: f32, image_width: u32) -> PlanarOffset {
        let pixel_offset = image_width as f32 / 2.0 - pixel_col;
        let scale = depth / pixel_offset.hypot(self.baseline_px);
        PlanarOffset {
            forward: self.baseline_px * scale,
            lateral: pixel_offset * scale * 2.0,
        }
    }
}

/// [`BaselineProjection::offset`] with [`DEFAULT_BASELINE_PX`].
pub fn pixel_to_offset(pixel_col: f32, depth: f32, image_width: u32) -> PlanarOffset {
    BaselineProjection::default().offset(pixel_col, depth, image_width)
}

/// Closest finite, positive depth in a depth-image row.
///
/// Returns `(column, depth)`; the leftmost column wins on ties.
pub fn nearest_column(row: &[f32]) -> Option<(usize, f32)> {
    row.iter()
        .copied()
        .enumerate()
        .filter(|(_, d)| d.is_finite() && *d > 0.0)
        .fold(None, |best, (col, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((col, d)),
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Pinhole intrinsics
// ────────────────────────────────────────────────────────────────────────────

/// Calibrated pinhole intrinsics for the RGB-D camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Default for CameraIntrinsics {
    /// 640×480 RGB stream of a RealSense-class camera.
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fx: 615.0,
            fy: 615.0,
            cx: 320.0,
            cy: 240.0,
        }
    }
}

impl CameraIntrinsics {
    /// Back-project pixel `(u, v)` at `depth` into the camera optical frame
    /// (`x` right, `y` down, `z` along the optical axis).
    ///
    /// A non-finite or non-positive depth yields an invalid point.
    pub fn back_project(&self, u: f32, v: f32, depth: f32) -> Point {
        let point = Point::new(
            (u - self.cx) * depth / self.fx,
            (v - self.cy) * depth / self.fy,
            depth,
        )
        .with_distance(depth);
        if depth > 0.0 { point } else { point.invalidated() }
    }

    /// Project an optical-frame point onto the image.  `None` when the point
    /// is behind the camera.
    pub fn project(&self, point: &Point) -> Option<(f32, f32)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }

    /// `true` when `(u, v)` lies inside the image.
    pub fn contains(&self, u: f32, v: f32) -> bool {
        u >= 0.0 && v >= 0.0 && u < self.width as f32 && v < self.height as f32
    }
}
