//! Lateral shift: a one-shot range correction.
//!
//! The distance to the nearest object is measured from the depth image and
//! compared with the desired standoff.  When the object is further away than
//! the standoff, the difference, scaled by the calibrated gain, becomes a
//! single forward walk of that many step units.  A base that is already at
//! or inside the standoff does not move.  After the base settles the
//! navigator is re-anchored where it actually ended up.

use mantis_hal::RobotPort;
use mantis_types::Pose2D;
use tracing::{info, instrument};

use crate::controller::{Controller, MotionSession};
use crate::error::ControlResult;

/// Outcome of a shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftReport {
    /// Depth of the nearest object before moving.
    pub measured_depth: f32,
    /// `measured_depth - target`.
    pub offset: f32,
    /// Forward step units commanded; zero when no correction was needed.
    pub commanded_units: f32,
    /// Distance actually travelled, from two fresh transforms.
    pub displacement: f32,
    /// Pose handed to the navigator, when the base moved.
    pub anchor: Option<Pose2D>,
}

impl<R: RobotPort> Controller<R> {
    /// Close the gap to the nearest object until it is `target` away.
    /// Never backs up.
    #[instrument(skip(self))]
    pub fn shift(&self, target: f32) -> ControlResult<ShiftReport> {
        let mut session = self.session("shift", 1)?;
        let result = self.run_shift(&mut session, target);
        session.finish(result)
    }

    fn run_shift(&self, session: &mut MotionSession<'_, R>, target: f32) -> ControlResult<ShiftReport> {
        let cfg = &self.config;
        session.step()?;
        let fix = self.measure_center()?;
        let offset = fix.depth - target;

        if offset < cfg.shift_tolerance {
            info!(offset, "at or inside standoff");
            return Ok(ShiftReport {
                measured_depth: fix.depth,
                offset,
                commanded_units: 0.0,
                displacement: 0.0,
                anchor: None,
            });
        }

        let start = self.position_in_working()?;
        let units = offset * cfg.shift_gain;
        session.walk(units, false)?;
        session.sleep(cfg.shift_settle_secs)?;

        let anchor = self.reanchor(start)?;
        let displacement = (anchor.x - start.x).hypot(anchor.y - start.y);
        info!(offset, units, displacement, "shift complete");
        Ok(ShiftReport {
            measured_depth: fix.depth,
            offset,
            commanded_units: units,
            displacement,
            anchor: Some(anchor),
        })
    }
}
