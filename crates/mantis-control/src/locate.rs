//! One-shot target localisation.
//!
//! Two measurement paths, both returning points in the base frame:
//!
//! - [`Controller::locate_target`]: detection frame → selector → depth at the
//!   chosen pixel → pinhole back-projection → camera-to-base transform.
//! - [`Controller::measure_center`]: nearest column of the bottom depth row →
//!   fixed-baseline back-projection, offset by the camera mount.

use mantis_hal::RobotPort;
use mantis_perception::{BaselineProjection, nearest_column, select_target};
use mantis_types::{Detection, Point};
use tracing::{debug, instrument};

use crate::controller::Controller;
use crate::error::{ControlError, ControlResult};

/// A detection resolved to metric coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedTarget {
    pub detection: Detection,
    /// Back-projected point in the camera optical frame.
    pub camera_point: Point,
    pub base_point: Point,
}

/// Nearest object straight from the depth image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterFix {
    /// Position in the base frame.
    pub point: Point,
    /// Angle of `point` from the base's forward axis.
    pub bearing: f32,
    /// Raw depth of the nearest column.
    pub depth: f32,
    pub column: usize,
}

impl<R: RobotPort> Controller<R> {
    /// Locate the configured target label in the current camera frame.
    ///
    /// # Errors
    ///
    /// [`ControlError::NoTarget`] when no detection qualifies or the depth at
    /// the chosen pixel is unusable.
    #[instrument(skip(self))]
    pub fn locate_target(&self) -> ControlResult<LocatedTarget> {
        let cfg = &self.config;
        let frame = self.robot.detections()?;
        let detection = select_target(&frame, &cfg.target_label, cfg.min_confidence)
            .cloned()
            .ok_or(ControlError::NoTarget)?;

        let u = detection.center_x.round().max(0.0) as u32;
        let v = detection.center_y.round().max(0.0) as u32;
        let depth = self.robot.depth_at(u, v)?;
        let camera_point = cfg.intrinsics.back_project(u as f32, v as f32, depth);
        if !camera_point.valid {
            debug!(u, v, depth, "no usable depth at target pixel");
            return Err(ControlError::NoTarget);
        }

        let base_point = self
            .robot
            .transform(&cfg.base_frame, &cfg.camera_frame)?
            .apply(&camera_point);
        debug!(x = base_point.x, y = base_point.y, z = base_point.z, "target located");
        Ok(LocatedTarget {
            detection,
            camera_point,
            base_point,
        })
    }

    /// Find the nearest thing in the bottom depth row.
    ///
    /// # Errors
    ///
    /// [`ControlError::NoTarget`] when the row holds no finite depth.
    #[instrument(skip(self))]
    pub fn measure_center(&self) -> ControlResult<CenterFix> {
        let cfg = &self.config;
        let row = self.robot.depth_row()?;
        let (column, depth) = nearest_column(&row.values).ok_or(ControlError::NoTarget)?;
        let offset = BaselineProjection::new(cfg.baseline_px).offset(column as f32, depth, row.width());

        let mount = self
            .robot
            .transform(&cfg.base_frame, &cfg.camera_frame)?
            .translation;
        let point = Point::new(offset.forward + mount.x, offset.lateral + mount.y, mount.z).with_distance(depth);
        let bearing = point.y.atan2(point.x);
        debug!(column, depth, x = point.x, y = point.y, bearing, "center measured");
        Ok(CenterFix {
            point,
            bearing,
            depth,
            column,
        })
    }
}
