//! The [`RobotPort`] trait – the boundary between the control core and the
//! robot.
//!
//! The runtime that multiplexes ROS topics, actions and services implements
//! this trait; the controllers only ever talk to it.  Every call looks
//! synchronous and may block for a bounded, externally determined time.
//! Implementations must be `Send + Sync` so a single port can be shared by
//! the controller and a cancelling thread.

use mantis_perception::Transform3D;
use mantis_types::{DepthRow, DetectionFrame, MantisError, MotionCommand, Pose2D, Sighting};

use crate::stream::SampleStream;

/// Synchronous-looking access to motion, sensing and frame lookup.
pub trait RobotPort: Send + Sync {
    /// Issue a velocity command.  A zero axis stops that axis.
    ///
    /// # Errors
    ///
    /// Returns [`MantisError::MotionFault`] if the command cannot be applied.
    fn drive(&self, command: MotionCommand) -> Result<(), MantisError>;

    /// Block for `seconds` of robot time.
    fn sleep(&self, seconds: f32) -> Result<(), MantisError>;

    /// Current pose in the working frame.
    fn pose(&self) -> Result<Pose2D, MantisError>;

    /// Transform mapping points in `source_frame` into `target_frame`, as of
    /// now.
    ///
    /// # Errors
    ///
    /// Returns [`MantisError::TransformUnavailable`] when the frames are not
    /// currently resolvable.
    fn transform(&self, target_frame: &str, source_frame: &str) -> Result<Transform3D, MantisError>;

    /// One front-facing range sample (metres).
    fn sample_distance(&self) -> Result<f32, MantisError>;

    /// Subscribe to the front-facing range feed.  The subscription is
    /// released when the returned stream is dropped.
    fn subscribe_distance(&self) -> Result<SampleStream<f32>, MantisError>;

    /// Single-shot object localisation in the robot base frame.
    fn sample_detection(&self) -> Result<Sighting, MantisError>;

    /// All object detections in the latest camera frame.
    fn detections(&self) -> Result<DetectionFrame, MantisError>;

    /// Depth at pixel `(col, row)` of the depth image aligned with the RGB
    /// stream.  Non-finite when the pixel has no return.
    fn depth_at(&self, col: u32, row: u32) -> Result<f32, MantisError>;

    /// Bottom row of the depth image.
    fn depth_row(&self) -> Result<DepthRow, MantisError>;

    /// Pose stored under `name` on the map.
    ///
    /// # Errors
    ///
    /// Returns [`MantisError::UnknownPosition`] for unknown names.
    fn named_position(&self, name: &str) -> Result<Pose2D, MantisError>;

    /// Hand a goal pose to the navigator and block until it is reached.
    fn navigate_to(&self, goal: Pose2D) -> Result<(), MantisError>;
}

impl<P: RobotPort + ?Sized> RobotPort for std::sync::Arc<P> {
    fn drive(&self, command: MotionCommand) -> Result<(), MantisError> {
        (**self).drive(command)
    }

    fn sleep(&self, seconds: f32) -> Result<(), MantisError> {
        (**self).sleep(seconds)
    }

    fn pose(&self) -> Result<Pose2D, MantisError> {
        (**self).pose()
    }

    fn transform(&self, target_frame: &str, source_frame: &str) -> Result<Transform3D, MantisError> {
        (**self).transform(target_frame, source_frame)
    }

    fn sample_distance(&self) -> Result<f32, MantisError> {
        (**self).sample_distance()
    }

    fn subscribe_distance(&self) -> Result<SampleStream<f32>, MantisError> {
        (**self).subscribe_distance()
    }

    fn sample_detection(&self) -> Result<Sighting, MantisError> {
        (**self).sample_detection()
    }

    fn detections(&self) -> Result<DetectionFrame, MantisError> {
        (**self).detections()
    }

    fn depth_at(&self, col: u32, row: u32) -> Result<f32, MantisError> {
        (**self).depth_at(col, row)
    }

    fn depth_row(&self) -> Result<DepthRow, MantisError> {
        (**self).depth_row()
    }

    fn named_position(&self, name: &str) -> Result<Pose2D, MantisError> {
        (**self).named_position(name)
    }

    fn navigate_to(&self, goal: Pose2D) -> Result<(), MantisError> {
        (**self).navigate_to(goal)
    }
}
