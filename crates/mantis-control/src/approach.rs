//! Coarse straight-line approach.
//!
//! The target is anchored once in the working frame.  Each iteration then
//! re-expresses the anchor in the base frame through a fresh transform, so
//! the remaining distance comes from where the robot actually is rather than
//! from dead reckoning.

use mantis_hal::RobotPort;
use mantis_types::Point;
use tracing::{debug, info, instrument};

use crate::controller::{Controller, MotionSession};
use crate::error::{ControlError, ControlResult};

/// Outcome of a converged approach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachReport {
    /// The target in the working frame.
    pub anchor: Point,
    /// Forward distance to the anchor when the approach stopped.
    pub remaining: f32,
    pub iterations: usize,
}

impl<R: RobotPort> Controller<R> {
    /// Step forward until the target, given in the base frame, is closer
    /// than `threshold` along the robot's forward axis.
    ///
    /// `threshold` is an absolute distance, independent of how far away the
    /// target started.
    #[instrument(skip(self, target), fields(x = target.x, y = target.y))]
    pub fn approach(&self, target: Point, threshold: f32) -> ControlResult<ApproachReport> {
        let mut session = self.session("approach", self.config.max_iterations)?;
        let result = self.run_approach(&mut session, target, threshold);
        session.finish(result)
    }

    fn run_approach(
        &self,
        session: &mut MotionSession<'_, R>,
        target: Point,
        threshold: f32,
    ) -> ControlResult<ApproachReport> {
        if !target.valid {
            return Err(ControlError::NoTarget);
        }
        let cfg = &self.config;
        let anchor = self
            .robot
            .transform(&cfg.working_frame, &cfg.base_frame)?
            .apply(&target);

        let mut remaining = target.x;
        loop {
            let iteration = session.step()?;
            debug!(iteration, remaining, "approach");
            if remaining < threshold {
                session.halt()?;
                info!(iterations = iteration, remaining, "approach converged");
                return Ok(ApproachReport {
                    anchor,
                    remaining,
                    iterations: iteration,
                });
            }
            session.walk(cfg.walk_step_units, false)?;
            remaining = self
                .robot
                .transform(&cfg.base_frame, &cfg.working_frame)?
                .apply(&anchor)
                .x;
        }
    }
}

#[cfg(test)]
mod tests {
    use mantis_hal::sim::SimRobot;
    use mantis_kernel::CancelToken;
    use mantis_types::{MantisError, MotionCommand};

    use crate::config::ControlConfig;
    use crate::error::TerminalStatus;
    use crate::test_support::ScriptedRobot;

    use super::*;

    #[test]
    fn sim_walks_until_inside_threshold() {
        let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
        let report = ctl.approach(Point::new(1.5, 0.0, 0.3), 0.95).unwrap();

        assert!((report.anchor.x - 1.5).abs() < 1e-5);
        assert!(report.remaining < 0.95 && report.remaining > 0.85, "{report:?}");
        let pose = ctl.robot().current_pose();
        assert!((1.5 - pose.x - report.remaining).abs() < 1e-4);
        assert!(!ctl.robot().is_moving());
    }

    #[test]
    fn near_target_converges_immediately() {
        let ctl = Controller::new(ScriptedRobot::new(), ControlConfig::default());
        let report = ctl.approach(Point::new(0.5, 0.1, 0.0), 0.95).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(ctl.robot().commands(), vec![MotionCommand::stop()]);
    }

    #[test]
    fn invalid_target_is_no_target() {
        let ctl = Controller::new(ScriptedRobot::new(), ControlConfig::default());
        let result = ctl.approach(Point::new(f32::NAN, 0.0, 0.0), 0.95);
        assert_eq!(TerminalStatus::of(&result), TerminalStatus::NoTarget);
    }

    #[test]
    fn missing_transform_fails_stopped() {
        let robot = ScriptedRobot::new();
        robot.fail_transforms();
        let ctl = Controller::new(robot, ControlConfig::default());
        let result = ctl.approach(Point::new(2.0, 0.0, 0.0), 0.95);
        assert!(matches!(
            result,
            Err(ControlError::Unavailable(MantisError::TransformUnavailable { .. }))
        ));
        assert_eq!(TerminalStatus::of(&result), TerminalStatus::Failed);
        assert_eq!(ctl.robot().last_command(), Some(MotionCommand::stop()));
    }

    #[test]
    fn cancelled_mid_walk_stops_once() {
        let token = CancelToken::new();
        let ctl = Controller::new(
            ScriptedRobot::new().cancel_on_sleep(3, token.clone()),
            ControlConfig::default(),
        )
        .with_cancel_token(token);

        let result = ctl.approach(Point::new(2.0, 0.0, 0.0), 0.95);
        assert_eq!(result, Err(ControlError::Cancelled));
        assert_eq!(TerminalStatus::of(&result), TerminalStatus::Failed);
        // Two full pulses, the third cut short by the cancellation.
        assert_eq!(ctl.robot().commands_after_cancel(), vec![MotionCommand::stop()]);
        assert_eq!(ctl.robot().stops(), 3);
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn sim_timeout_leaves_robot_stopped() {
        let cfg = ControlConfig {
            max_iterations: 2,
            ..ControlConfig::default()
        };
        let ctl = Controller::new(SimRobot::default(), cfg);
        let result = ctl.approach(Point::new(3.0, 0.0, 0.0), 0.95);
        assert!(matches!(result, Err(ControlError::Timeout { iterations: 2, .. })));
        assert!(!ctl.robot().is_moving());
        // Two walk pulses, each ending in a stop, plus the abort stop.
        assert_eq!(ctl.robot().stop_count(), 3);
        assert!((ctl.robot().current_pose().x - 0.1).abs() < 1e-4);
    }
}
