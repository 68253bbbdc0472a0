//! Angular alignment.
//!
//! Bang-bang heading control: each iteration samples the pose, computes the
//! wrapped heading error and either stops (converged) or turns one fixed
//! pulse in the direction of the error.  The goal is either a fixed bearing
//! or, for the face-the-point variant, recomputed from the live position
//! every iteration.
//!
//! [`Controller::face_target`] composes detection with face-the-point: it
//! turns toward the detected object, then re-anchors the navigator on the
//! robot's position with the bearing to the object as heading.

use mantis_hal::RobotPort;
use mantis_types::{Point, Pose2D, bearing, wrap_angle};
use tracing::{debug, info, instrument};

use crate::controller::{Controller, MotionSession};
use crate::error::{ControlError, ControlResult};
use crate::locate::LocatedTarget;

/// Outcome of a converged alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignReport {
    /// Goal bearing at convergence, in `(-π, π]`.
    pub goal_heading: f32,
    pub final_heading: f32,
    /// Remaining wrapped error; `|error| < angle_epsilon`.
    pub error: f32,
    pub iterations: usize,
}

/// Outcome of facing the detected target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceReport {
    /// Target position in the working frame.
    pub target: Point,
    /// Detection attempts spent before the target was seen.
    pub attempts: usize,
    pub alignment: AlignReport,
    /// Pose handed to the navigator after the turn.
    pub anchor: Pose2D,
}

impl<R: RobotPort> Controller<R> {
    /// Turn until the heading matches `goal_heading` (working frame).
    #[instrument(skip(self))]
    pub fn align_to(&self, goal_heading: f32) -> ControlResult<AlignReport> {
        let mut session = self.session("align_to", self.config.max_iterations)?;
        let result = self.run_alignment(&mut session, |_| goal_heading);
        session.finish(result)
    }

    /// Align to the heading stored with a named map position.
    #[instrument(skip(self))]
    pub fn align_to_named(&self, name: &str) -> ControlResult<AlignReport> {
        let goal = self.robot.named_position(name)?;
        self.align_to(goal.heading)
    }

    /// Turn until the robot faces the working-frame point `(x, y)`.
    #[instrument(skip(self))]
    pub fn face_point(&self, x: f32, y: f32) -> ControlResult<AlignReport> {
        let mut session = self.session("face_point", self.config.max_iterations)?;
        let result = self.run_alignment(&mut session, |pose| bearing(pose.x, pose.y, x, y));
        session.finish(result)
    }

    /// Turn until the robot faces a named map position.
    #[instrument(skip(self))]
    pub fn face_named(&self, name: &str) -> ControlResult<AlignReport> {
        let goal = self.robot.named_position(name)?;
        self.face_point(goal.x, goal.y)
    }

    /// Turn toward the detected target, then navigate to the current
    /// position with the heading pointing at it.
    ///
    /// The target is re-detected every `locate_retry_secs` while it is out
    /// of view, up to `locate_attempts` times.  The alignment goal is the
    /// live bearing to the target plus `bearing_bias`.
    ///
    /// # Errors
    ///
    /// [`ControlError::NoTarget`] when every attempt misses.
    #[instrument(skip(self))]
    pub fn face_target(&self) -> ControlResult<FaceReport> {
        let mut session = self.session("face_target", self.config.max_iterations)?;
        let result = self.run_face_target(&mut session);
        session.finish(result)
    }

    fn run_face_target(&self, session: &mut MotionSession<'_, R>) -> ControlResult<FaceReport> {
        let cfg = &self.config;
        let (located, attempts) = self.locate_with_retry(session)?;

        let to_working = self.robot.transform(&cfg.working_frame, &cfg.base_frame)?;
        let root = to_working.apply(&Point::origin());
        let target = to_working.apply(&located.base_point);
        debug!(x = target.x, y = target.y, attempts, "target in working frame");

        let bias = cfg.bearing_bias;
        let alignment =
            self.run_alignment(session, |pose| bearing(pose.x, pose.y, target.x, target.y) + bias)?;

        let anchor = Pose2D::new(root.x, root.y, bearing(root.x, root.y, target.x, target.y));
        self.robot.navigate_to(anchor)?;
        info!(heading = anchor.heading, "facing target");
        Ok(FaceReport {
            target,
            attempts,
            alignment,
            anchor,
        })
    }

    /// Returns the located target and the 1-based attempt that saw it.
    fn locate_with_retry(&self, session: &MotionSession<'_, R>) -> ControlResult<(LocatedTarget, usize)> {
        let attempts = self.config.locate_attempts.max(1);
        for attempt in 1..=attempts {
            session.checkpoint()?;
            match self.locate_target() {
                Ok(located) => return Ok((located, attempt)),
                Err(ControlError::NoTarget) if attempt < attempts => {
                    debug!(attempt, "target not in view");
                    session.sleep(self.config.locate_retry_secs)?;
                }
                Err(e) => return Err(e),
            }
        }
        Err(ControlError::NoTarget)
    }

    fn run_alignment(
        &self,
        session: &mut MotionSession<'_, R>,
        goal: impl Fn(Pose2D) -> f32,
    ) -> ControlResult<AlignReport> {
        let epsilon = self.config.angle_epsilon;
        loop {
            let iteration = session.step()?;
            let pose = self.robot.pose()?;
            let goal_heading = wrap_angle(goal(pose));
            let current = wrap_angle(pose.heading);
            let error = wrap_angle(goal_heading - current);
            debug!(iteration, current, goal_heading, error, "align");

            if error.abs() < epsilon {
                session.halt()?;
                info!(iterations = iteration, error, "alignment converged");
                return Ok(AlignReport {
                    goal_heading,
                    final_heading: current,
                    error,
                    iterations: iteration,
                });
            }
            session.turn(error.signum() * self.config.turn_step_units)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use mantis_hal::sim::{SimRobot, SimSettings};
    use mantis_kernel::CancelToken;
    use mantis_types::{MantisError, MotionCommand, Sign};

    use crate::config::ControlConfig;
    use crate::error::{ControlError, TerminalStatus};
    use crate::test_support::ScriptedRobot;

    use super::*;

    #[test]
    fn converges_with_final_zero_turn() {
        let headings = (0..=10).map(|i| 0.2 - 0.02 * i as f32);
        let ctl = Controller::new(ScriptedRobot::new().with_headings(headings), ControlConfig::default());

        let report = ctl.align_to(0.0).unwrap();
        assert!(report.error.abs() < 0.02);
        assert!(report.iterations <= 11, "iterations={}", report.iterations);

        let commands = ctl.robot().commands();
        assert_eq!(commands.last(), Some(&MotionCommand::stop()));
        // Every pulse turned clockwise, towards zero.
        assert!(
            commands
                .iter()
                .filter(|c| !c.is_stop())
                .all(|c| *c == MotionCommand::turn(Sign::Negative))
        );
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn already_aligned_issues_only_stop() {
        let ctl = Controller::new(ScriptedRobot::new().with_headings([0.01]), ControlConfig::default());
        let report = ctl.align_to(0.0).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(ctl.robot().commands(), vec![MotionCommand::stop()]);
    }

    #[test]
    fn turns_the_short_way_across_pi() {
        let cfg = ControlConfig {
            max_iterations: 1,
            ..ControlConfig::default()
        };
        let ctl = Controller::new(ScriptedRobot::new().with_headings([-3.1]), cfg);
        let _ = ctl.align_to(3.1);
        assert_eq!(ctl.robot().commands()[0], MotionCommand::turn(Sign::Negative));
    }

    #[test]
    fn cancellation_stops_exactly_once() {
        let token = CancelToken::new();
        let ctl = Controller::new(
            ScriptedRobot::new().with_headings([0.0]).cancel_on_sleep(3, token.clone()),
            ControlConfig::default(),
        )
        .with_cancel_token(token);

        assert_eq!(ctl.align_to(1.0), Err(ControlError::Cancelled));
        assert_eq!(ctl.robot().commands_after_cancel(), vec![MotionCommand::stop()]);
    }

    #[test]
    fn cancelled_before_start_still_stops() {
        let ctl = Controller::new(ScriptedRobot::new().with_headings([0.0]), ControlConfig::default());
        ctl.cancel_token().cancel();
        assert_eq!(ctl.align_to(1.0), Err(ControlError::Cancelled));
        assert_eq!(ctl.robot().commands(), vec![MotionCommand::stop()]);
    }

    #[test]
    fn timeout_leaves_robot_stopped() {
        let cfg = ControlConfig {
            max_iterations: 5,
            ..ControlConfig::default()
        };
        let ctl = Controller::new(ScriptedRobot::new().with_headings([0.0]), cfg);
        let result = ctl.align_to(1.0);
        assert_eq!(
            result,
            Err(ControlError::Timeout {
                operation: "align_to".to_string(),
                iterations: 5
            })
        );
        assert_eq!(TerminalStatus::of(&result), TerminalStatus::Failed);
        assert_eq!(ctl.robot().last_command(), Some(MotionCommand::stop()));
    }

    #[test]
    fn sim_aligns_to_named_heading() {
        let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
        let report = ctl.align_to_named("machining_center").unwrap();
        assert!((report.goal_heading - FRAC_PI_2).abs() < 1e-6);
        let heading = ctl.robot().current_pose().heading;
        assert!((heading - FRAC_PI_2).abs() < 0.02, "heading={heading}");
        assert!(!ctl.robot().is_moving());
    }

    #[test]
    fn sim_faces_point_behind() {
        let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
        ctl.face_point(-1.0, -0.01).unwrap();
        let heading = ctl.robot().current_pose().heading;
        let goal = (-0.01_f32).atan2(-1.0);
        assert!(wrap_angle(heading - goal).abs() < 0.02, "heading={heading}");
    }

    #[test]
    fn unknown_name_fails_without_motion() {
        let ctl = Controller::new(ScriptedRobot::new(), ControlConfig::default());
        let err = ctl.face_named("nowhere").unwrap_err();
        assert_eq!(err, ControlError::Unavailable(MantisError::UnknownPosition("nowhere".into())));
        assert!(ctl.robot().commands().is_empty());
    }

    #[test]
    fn face_named_uses_live_position() {
        // Robot at (2, 0) facing +X; "dock" is at (2, 1): straight to the left.
        let ctl = Controller::new(
            ScriptedRobot::new().with_poses([Pose2D::new(2.0, 0.0, FRAC_PI_2 - 0.005)]),
            ControlConfig::default(),
        );
        let report = ctl.face_named("dock").unwrap();
        assert!((report.goal_heading - FRAC_PI_2).abs() < 1e-5);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn sim_faces_detected_target_and_reanchors() {
        let settings = SimSettings {
            start: Pose2D::new(0.0, 0.0, 0.3),
            ..SimSettings::default()
        };
        let cfg = ControlConfig::default();
        let bias = cfg.bearing_bias;
        let ctl = Controller::new(SimRobot::new(settings), cfg);

        let report = ctl.face_target().unwrap();
        assert_eq!(report.attempts, 1);
        assert!((report.target.x - 1.5).abs() < 0.01, "{report:?}");
        assert!(report.target.y.abs() < 0.01, "{report:?}");
        // The turn converged on the biased bearing, the anchor on the plain one.
        assert!((report.alignment.goal_heading - bias).abs() < 0.01, "{report:?}");
        assert!(report.anchor.x.abs() < 1e-4 && report.anchor.y.abs() < 1e-4);
        assert!(report.anchor.heading.abs() < 0.01, "{report:?}");

        let pose = ctl.robot().current_pose();
        assert!((pose.heading - report.anchor.heading).abs() < 1e-6);
        assert!(!ctl.robot().is_moving());
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn face_target_retries_then_gives_up() {
        let ctl = Controller::new(ScriptedRobot::new(), ControlConfig::default());
        assert_eq!(ctl.face_target(), Err(ControlError::NoTarget));
        // One pause between each of the ten attempts.
        assert_eq!(ctl.robot().sleeps(), vec![1.0; 9]);
        assert_eq!(ctl.robot().commands(), vec![MotionCommand::stop()]);
        assert!(ctl.robot().navigation().is_empty());
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn face_target_cancelled_while_waiting_for_target() {
        let token = CancelToken::new();
        let ctl = Controller::new(
            ScriptedRobot::new().cancel_on_sleep(2, token.clone()),
            ControlConfig::default(),
        )
        .with_cancel_token(token);

        assert_eq!(ctl.face_target(), Err(ControlError::Cancelled));
        assert_eq!(ctl.robot().sleeps().len(), 2);
        assert_eq!(ctl.robot().commands(), vec![MotionCommand::stop()]);
    }
}
