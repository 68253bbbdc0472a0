//! Visual-servo approach.
//!
//! The base drives forward continuously while the controller consumes the
//! live range feed; the first sample at or under the threshold stops it.
//! The feed subscription is scoped to the consuming loop and released on
//! every exit path.  A feed that goes quiet does not stall the loop: the
//! wait is bounded, and cancellation and the wall-clock budget are checked
//! between waits.  After a settle period the navigator is re-anchored at the
//! position actually reached.

use std::time::Duration;

use mantis_hal::{RobotPort, Recv};
use mantis_types::{MotionCommand, Point, Pose2D, Sign};
use tracing::{debug, info, instrument};

use crate::controller::{Controller, MotionSession};
use crate::error::{ControlError, ControlResult};

/// Longest wait for one feed sample before re-checking cancellation and the
/// deadline.
const FEED_WAIT: Duration = Duration::from_millis(20);

/// Outcome of a converged visual-servo approach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualReport {
    /// The sample that crossed the threshold.
    pub final_distance: f32,
    /// Samples consumed, including the final one.
    pub samples: usize,
    /// Robot position in the working frame before moving.
    pub start: Point,
    /// Pose handed to the navigator after settling.
    pub anchor: Pose2D,
}

impl<R: RobotPort> Controller<R> {
    /// Drive forward until the range feed reports `threshold` or less.
    #[instrument(skip(self))]
    pub fn visual_approach(&self, threshold: f32) -> ControlResult<VisualReport> {
        let mut session = self.session("visual_approach", self.config.max_stream_samples)?;
        let result = self.run_visual(&mut session, threshold);
        session.finish(result)
    }

    fn run_visual(&self, session: &mut MotionSession<'_, R>, threshold: f32) -> ControlResult<VisualReport> {
        let start = self.position_in_working()?;
        session.drive(MotionCommand::walk(Sign::Positive, false))?;

        let (final_distance, samples) = {
            let mut feed = self.robot.subscribe_distance()?;
            loop {
                match feed.recv_timeout(FEED_WAIT) {
                    Recv::Sample(distance) => {
                        let sample = session.step()?;
                        debug!(sample, distance, "visual approach");
                        if distance <= threshold {
                            break (distance, sample);
                        }
                    }
                    Recv::Idle => session.checkpoint()?,
                    Recv::Closed => return Err(ControlError::StreamClosed),
                }
            }
        };

        session.halt()?;
        info!(samples, final_distance, "visual approach reached threshold");
        session.sleep(self.config.visual_settle_secs)?;
        let anchor = self.reanchor(start)?;

        Ok(VisualReport {
            final_distance,
            samples,
            start,
            anchor,
        })
    }
}

#[cfg(test)]
mod tests {
    use mantis_hal::sim::SimRobot;
    use mantis_kernel::CancelToken;
    use std::time::Instant;

    use crate::config::ControlConfig;
    use crate::test_support::ScriptedRobot;

    use super::*;

    #[test]
    fn stops_on_first_sample_under_threshold() {
        let ctl = Controller::new(
            ScriptedRobot::new().with_distances(vec![1.0, 0.6, 0.19, 0.1]),
            ControlConfig::default(),
        );
        let report = ctl.visual_approach(0.2).unwrap();
        assert_eq!(report.samples, 3);
        assert_eq!(report.final_distance, 0.19);
        assert_eq!(ctl.robot().releases(), 1);
        assert_eq!(
            ctl.robot().commands(),
            vec![MotionCommand::walk(Sign::Positive, false), MotionCommand::stop()]
        );
        assert_eq!(ctl.robot().sleeps(), vec![5.0]);
        assert_eq!(ctl.robot().navigation(), vec![report.anchor]);
    }

    #[test]
    fn exhausted_feed_is_stream_closed() {
        let ctl = Controller::new(
            ScriptedRobot::new().with_distances(vec![1.0, 0.9]),
            ControlConfig::default(),
        );
        assert_eq!(ctl.visual_approach(0.2), Err(ControlError::StreamClosed));
        assert_eq!(ctl.robot().releases(), 1);
        assert_eq!(ctl.robot().last_command(), Some(MotionCommand::stop()));
        assert!(ctl.robot().navigation().is_empty());
    }

    #[test]
    fn sample_budget_releases_feed() {
        let cfg = ControlConfig {
            max_stream_samples: 2,
            ..ControlConfig::default()
        };
        let ctl = Controller::new(ScriptedRobot::new().with_distances(vec![1.0; 10]), cfg);
        let result = ctl.visual_approach(0.2);
        assert!(matches!(result, Err(ControlError::Timeout { iterations: 2, .. })));
        assert_eq!(ctl.robot().releases(), 1);
        assert_eq!(ctl.robot().last_command(), Some(MotionCommand::stop()));
    }

    #[test]
    fn cancellation_during_feed_releases_and_stops_once() {
        let token = CancelToken::new();
        token.cancel();
        let ctl = Controller::new(
            ScriptedRobot::new().with_distances(vec![1.0, 0.5, 0.1]),
            ControlConfig::default(),
        )
        .with_cancel_token(token);
        assert_eq!(ctl.visual_approach(0.2), Err(ControlError::Cancelled));
        assert_eq!(ctl.robot().releases(), 1);
        assert_eq!(ctl.robot().stops(), 1);
    }

    #[test]
    fn cancelled_while_driving_stops_once_and_releases() {
        let token = CancelToken::new();
        let ctl = Controller::new(
            ScriptedRobot::new()
                .with_distances(vec![1.0, 0.8, 0.6, 0.1])
                .cancel_on_command(1, token.clone()),
            ControlConfig::default(),
        )
        .with_cancel_token(token);

        assert_eq!(ctl.visual_approach(0.2), Err(ControlError::Cancelled));
        assert_eq!(ctl.robot().commands_after_cancel(), vec![MotionCommand::stop()]);
        assert_eq!(ctl.robot().stops(), 1);
        assert_eq!(ctl.robot().releases(), 1);
        assert!(ctl.robot().navigation().is_empty());
    }

    #[test]
    fn silent_feed_hits_deadline_and_stops() {
        let cfg = ControlConfig {
            max_duration_secs: 0.1,
            max_stream_samples: 3,
            ..ControlConfig::default()
        };
        let ctl = Controller::new(ScriptedRobot::new().with_distances(vec![1.0]).with_stalled_feed(), cfg);

        let started = Instant::now();
        let result = ctl.visual_approach(0.2);
        assert!(started.elapsed() < Duration::from_secs(2), "waited {:?}", started.elapsed());
        assert!(matches!(result, Err(ControlError::Timeout { iterations: 1, .. })), "{result:?}");
        assert_eq!(
            ctl.robot().commands(),
            vec![MotionCommand::walk(Sign::Positive, false), MotionCommand::stop()]
        );
        assert_eq!(ctl.robot().releases(), 1);
        assert!(!ctl.motion_lock().is_held());
    }

    #[test]
    fn cancel_reaches_a_silent_feed() {
        let ctl = Controller::new(
            ScriptedRobot::new().with_stalled_feed(),
            ControlConfig::default(),
        );
        let token = ctl.cancel_token();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let started = Instant::now();
        assert_eq!(ctl.visual_approach(0.2), Err(ControlError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
        assert_eq!(
            ctl.robot().commands(),
            vec![MotionCommand::walk(Sign::Positive, false), MotionCommand::stop()]
        );
        assert_eq!(ctl.robot().releases(), 1);
    }

    #[test]
    fn sim_servo_stops_near_object_and_reanchors() {
        let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
        let report = ctl.visual_approach(0.2).unwrap();

        let robot = ctl.robot();
        assert_eq!(robot.stream_releases(), 1);
        assert_eq!(robot.open_streams(), 0);
        // Object at x = 1.5: the base stops roughly 0.2 short of it.
        let pose = robot.current_pose();
        assert!((pose.x - 1.3).abs() < 0.02, "x={}", pose.x);
        assert!(pose.heading.abs() < 1e-4);
        assert_eq!(robot.navigation_goals(), vec![report.anchor]);
        assert!(!robot.is_moving());
    }
}
