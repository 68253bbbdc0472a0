//! [`Controller`] and the per-invocation [`MotionSession`].
//!
//! Every motion-issuing operation runs inside a session that
//!
//! 1. holds the robot's [`MotionLock`] for its whole duration,
//! 2. polls the [`CancelToken`] and the [`IterationGuard`] at the top of each
//!    iteration, and
//! 3. on any failure (cancellation, timeout, unavailable resource) issues
//!    exactly one stop command before the error is returned.
//!
//! The stepping primitives (`mini_walk`, `mini_turn`, `walk_steps`) and
//! named-position navigation live here too; the convergence controllers are
//! in their own modules and build on the session.

use mantis_hal::RobotPort;
use mantis_kernel::{CancelToken, IterationGuard, MotionGuard, MotionLock};
use mantis_types::{MotionCommand, Point, Pose2D, Sign};
use tracing::{debug, info, instrument, warn};

use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Perception-to-motion controllers bound to one robot.
///
/// Clone the [`CancelToken`] (see [`Controller::cancel_token`]) to stop a
/// running operation from another thread.  Controllers sharing a robot must
/// share a [`MotionLock`] (see [`Controller::with_motion_lock`]).
#[derive(Debug)]
pub struct Controller<R: RobotPort> {
    pub(crate) robot: R,
    pub(crate) config: ControlConfig,
    motion: MotionLock,
    cancel: CancelToken,
}

impl<R: RobotPort> Controller<R> {
    pub fn new(robot: R, config: ControlConfig) -> Self {
        Self {
            robot,
            config,
            motion: MotionLock::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Share `lock` with other controllers driving the same robot.
    pub fn with_motion_lock(mut self, lock: MotionLock) -> Self {
        self.motion = lock;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels whatever operation is running.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn motion_lock(&self) -> &MotionLock {
        &self.motion
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ControlConfig {
        &mut self.config
    }

    /// Open a session for `operation` with an iteration budget of `budget`.
    pub(crate) fn session(&self, operation: &'static str, budget: usize) -> ControlResult<MotionSession<'_, R>> {
        let lock = self
            .motion
            .try_acquire(operation)
            .map_err(|e| ControlError::from_kernel(operation, e))?;
        Ok(MotionSession {
            controller: self,
            operation,
            guard: IterationGuard::new(budget, self.config.max_duration()),
            moving: false,
            _lock: lock,
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Robot origin expressed in the working frame, from a fresh transform.
    pub(crate) fn position_in_working(&self) -> ControlResult<Point> {
        let to_working = self
            .robot
            .transform(&self.config.working_frame, &self.config.base_frame)?;
        Ok(to_working.apply(&Point::origin()))
    }

    // ── Stepping primitives ─────────────────────────────────────────────────

    /// Walk for `|units|` step units, backward when `units` is negative, then
    /// stop.  Zero units only stops.
    #[instrument(skip(self))]
    pub fn mini_walk(&self, units: f32, high_speed: bool) -> ControlResult<()> {
        let mut session = self.session("mini_walk", 1)?;
        let result = session.walk(units, high_speed);
        session.finish(result)
    }

    /// Turn for `|units|` step units, clockwise when `units` is negative,
    /// then stop.  Zero units only stops.
    #[instrument(skip(self))]
    pub fn mini_turn(&self, units: f32) -> ControlResult<()> {
        let mut session = self.session("mini_turn", 1)?;
        let result = session.turn(units);
        session.finish(result)
    }

    /// Repeat a standard forward (or backward) step `times` times.
    #[instrument(skip(self))]
    pub fn walk_steps(&self, times: usize, backward: bool, high_speed: bool) -> ControlResult<()> {
        let mut session = self.session("walk_steps", times)?;
        let units = if backward {
            -self.config.walk_step_units
        } else {
            self.config.walk_step_units
        };
        let result = (0..times).try_for_each(|_| {
            session.step()?;
            session.walk(units, high_speed)
        });
        session.finish(result)
    }

    /// Navigate to the map position stored under `name`.
    #[instrument(skip(self))]
    pub fn goto_named(&self, name: &str) -> ControlResult<Pose2D> {
        let session = self.session("goto_named", 1)?;
        let result = self.robot.named_position(name).and_then(|goal| {
            self.robot.navigate_to(goal)?;
            Ok(goal)
        });
        if let Ok(goal) = &result {
            info!(name, x = goal.x, y = goal.y, heading = goal.heading, "arrived");
        }
        session.finish(result.map_err(ControlError::from))
    }

    /// Hand the navigator the current position, heading along the
    /// displacement from `start`.  A displacement too small to define a
    /// direction keeps the current heading.
    pub(crate) fn reanchor(&self, start: Point) -> ControlResult<Pose2D> {
        const MIN_DISPLACEMENT: f32 = 1e-3;

        let actual = self.position_in_working()?;
        let (dx, dy) = (actual.x - start.x, actual.y - start.y);
        let heading = if dx.hypot(dy) < MIN_DISPLACEMENT {
            self.robot.pose()?.heading
        } else {
            dy.atan2(dx)
        };
        let goal = Pose2D::new(actual.x, actual.y, heading);
        debug!(x = goal.x, y = goal.y, heading, "re-anchoring navigator");
        self.robot.navigate_to(goal)?;
        Ok(goal)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MotionSession
// ─────────────────────────────────────────────────────────────────────────────

/// Exclusive, bounded, cancellable access to the drive for one operation.
pub(crate) struct MotionSession<'a, R: RobotPort> {
    controller: &'a Controller<R>,
    operation: &'static str,
    guard: IterationGuard,
    moving: bool,
    _lock: MotionGuard,
}

impl<R: RobotPort> MotionSession<'_, R> {
    fn robot(&self) -> &R {
        &self.controller.robot
    }

    fn check_cancel(&self) -> ControlResult<()> {
        if self.controller.cancel.is_cancelled() {
            return Err(ControlError::Cancelled);
        }
        Ok(())
    }

    /// Top-of-iteration checkpoint: cancellation first, then the budget.
    /// Returns the 1-based iteration number.
    pub(crate) fn step(&mut self) -> ControlResult<usize> {
        self.check_cancel()?;
        self.guard
            .tick()
            .map_err(|e| ControlError::from_kernel(self.operation, e))
    }

    /// Checkpoint while waiting on an external source: cancellation, then
    /// the wall-clock budget.  Counts no iteration.
    pub(crate) fn checkpoint(&self) -> ControlResult<()> {
        self.check_cancel()?;
        self.guard
            .check_deadline()
            .map_err(|e| ControlError::from_kernel(self.operation, e))
    }

    pub(crate) fn drive(&mut self, command: MotionCommand) -> ControlResult<()> {
        self.robot().drive(command)?;
        self.moving = !command.is_stop();
        Ok(())
    }

    pub(crate) fn halt(&mut self) -> ControlResult<()> {
        self.drive(MotionCommand::stop())
    }

    /// Sleep, then fail if cancellation arrived meanwhile.
    pub(crate) fn sleep(&self, seconds: f32) -> ControlResult<()> {
        self.robot().sleep(seconds)?;
        self.check_cancel()
    }

    /// Hold `command` for `seconds`, then stop.  A cancellation observed
    /// after the sleep skips the stop; [`MotionSession::finish`] issues it.
    fn pulse(&mut self, command: MotionCommand, seconds: f32) -> ControlResult<()> {
        self.drive(command)?;
        self.sleep(seconds)?;
        self.halt()
    }

    pub(crate) fn walk(&mut self, units: f32, high_speed: bool) -> ControlResult<()> {
        if units == 0.0 {
            return self.halt();
        }
        let seconds = units.abs() * self.controller.config.unit_secs;
        self.pulse(MotionCommand::walk(Sign::of(units), high_speed), seconds)
    }

    pub(crate) fn turn(&mut self, units: f32) -> ControlResult<()> {
        if units == 0.0 {
            return self.halt();
        }
        let seconds = units.abs() * self.controller.config.unit_secs;
        self.pulse(MotionCommand::turn(Sign::of(units)), seconds)
    }

    /// Close the session.  On error the robot is stopped, exactly once,
    /// before the error is handed back.
    pub(crate) fn finish<T>(mut self, result: ControlResult<T>) -> ControlResult<T> {
        match result {
            Ok(value) => {
                if self.moving {
                    self.halt()?;
                }
                Ok(value)
            }
            Err(err) => {
                warn!(operation = self.operation, error = %err, iterations = self.guard.iterations(), "stopping");
                if let Err(stop_err) = self.robot().drive(MotionCommand::stop()) {
                    warn!(operation = self.operation, error = %stop_err, "stop command failed");
                }
                self.moving = false;
                Err(err)
            }
        }
    }
}

impl<R: RobotPort> Drop for MotionSession<'_, R> {
    fn drop(&mut self) {
        if self.moving {
            warn!(operation = self.operation, "session dropped while moving, stopping");
            let _ = self.controller.robot.drive(MotionCommand::stop());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRobot;
    use mantis_hal::sim::SimRobot;
    use mantis_types::MantisError;

    #[test]
    fn mini_walk_moves_then_stops() {
        let robot = ScriptedRobot::new();
        let ctl = Controller::new(robot, ControlConfig::default());
        ctl.mini_walk(-3.0, true).unwrap();
        assert_eq!(
            ctl.robot().commands(),
            vec![MotionCommand::walk(Sign::Negative, true), MotionCommand::stop()]
        );
        let sleeps = ctl.robot().sleeps();
        assert_eq!(sleeps.len(), 1);
        assert!((sleeps[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn zero_units_only_stop() {
        let ctl = Controller::new(ScriptedRobot::new(), ControlConfig::default());
        ctl.mini_turn(0.0).unwrap();
        assert_eq!(ctl.robot().commands(), vec![MotionCommand::stop()]);
        assert!(ctl.robot().sleeps().is_empty());
    }

    #[test]
    fn walk_steps_repeats_standard_step() {
        let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
        ctl.walk_steps(4, false, false).unwrap();
        // 4 × 0.5 s at 0.1 m/s.
        assert!((ctl.robot().current_pose().x - 0.2).abs() < 1e-4);
        assert_eq!(ctl.robot().stop_count(), 4);
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn busy_lock_refuses_motion() {
        let ctl = Controller::new(ScriptedRobot::new(), ControlConfig::default());
        let _held = ctl.motion_lock().try_acquire("elsewhere").unwrap();
        assert_eq!(
            ctl.mini_walk(5.0, false),
            Err(ControlError::MotionBusy {
                held_by: "elsewhere".to_string()
            })
        );
        assert!(ctl.robot().commands().is_empty());
    }

    #[test]
    fn drive_fault_is_unavailable_and_still_attempts_stop() {
        let robot = SimRobot::default();
        robot.fail_motion(true);
        let ctl = Controller::new(robot, ControlConfig::default());
        let err = ctl.mini_walk(5.0, false).unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(MantisError::MotionFault(_))));
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn goto_named_navigates() {
        let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
        let goal = ctl.goto_named("machining_center").unwrap();
        assert_eq!(ctl.robot().current_pose(), goal);
        assert_eq!(
            ctl.goto_named("nowhere"),
            Err(ControlError::Unavailable(MantisError::UnknownPosition(
                "nowhere".to_string()
            )))
        );
    }

    #[test]
    fn reanchor_keeps_heading_without_displacement() {
        let robot = SimRobot::new(mantis_hal::SimSettings {
            start: Pose2D::new(1.0, 2.0, 0.7),
            ..Default::default()
        });
        let ctl = Controller::new(robot, ControlConfig::default());
        let start = ctl.position_in_working().unwrap();
        let anchor = ctl.reanchor(start).unwrap();
        assert!((anchor.heading - 0.7).abs() < 1e-5);
        assert!((anchor.x - 1.0).abs() < 1e-5);
    }
}
