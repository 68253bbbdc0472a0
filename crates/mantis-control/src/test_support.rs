//! A recording [`RobotPort`] that replays scripted sensor values.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use mantis_hal::{RobotPort, SampleSender, SampleStream};
use mantis_kernel::CancelToken;
use mantis_perception::Transform3D;
use mantis_types::{DepthRow, DetectionFrame, MantisError, MotionCommand, Pose2D, Sighting};

#[derive(Debug, Default)]
struct Script {
    commands: Vec<MotionCommand>,
    sleeps: Vec<f32>,
    poses: VecDeque<Pose2D>,
    transforms: HashMap<(String, String), Transform3D>,
    transform_fault: bool,
    sightings: VecDeque<Sighting>,
    distances: Vec<f32>,
    stall_feed: bool,
    feed_sender: Option<SampleSender<f32>>,
    frame: DetectionFrame,
    depth: f32,
    depth_row: DepthRow,
    navigation: Vec<Pose2D>,
    cancel_on_sleep: Option<(usize, CancelToken)>,
    cancel_on_command: Option<(usize, CancelToken)>,
    commands_at_cancel: Option<usize>,
}

/// Scripted robot: poses are replayed in order (the last one repeats),
/// sightings are popped until exhausted (then `Missed`), unknown transforms
/// are the identity.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRobot {
    script: Mutex<Script>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedRobot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub(crate) fn with_headings(self, headings: impl IntoIterator<Item = f32>) -> Self {
        self.script()
            .poses
            .extend(headings.into_iter().map(|h| Pose2D::new(0.0, 0.0, h)));
        self
    }

    pub(crate) fn with_poses(self, poses: impl IntoIterator<Item = Pose2D>) -> Self {
        self.script().poses.extend(poses);
        self
    }

    pub(crate) fn with_transform(self, target: &str, source: &str, t: Transform3D) -> Self {
        self.script()
            .transforms
            .insert((target.to_string(), source.to_string()), t);
        self
    }

    pub(crate) fn with_sightings(self, sightings: impl IntoIterator<Item = Sighting>) -> Self {
        self.script().sightings.extend(sightings);
        self
    }

    pub(crate) fn with_distances(self, distances: Vec<f32>) -> Self {
        self.script().distances = distances;
        self
    }

    /// The distance feed delivers the scripted distances and then goes
    /// silent without closing.
    pub(crate) fn with_stalled_feed(self) -> Self {
        self.script().stall_feed = true;
        self
    }

    pub(crate) fn with_frame(self, frame: DetectionFrame, depth: f32) -> Self {
        {
            let mut s = self.script();
            s.frame = frame;
            s.depth = depth;
        }
        self
    }

    pub(crate) fn with_depth_row(self, values: Vec<f32>) -> Self {
        self.script().depth_row = DepthRow::new(values);
        self
    }

    /// Cancel `token` from inside the `n`-th sleep (1-based).
    pub(crate) fn cancel_on_sleep(self, n: usize, token: CancelToken) -> Self {
        self.script().cancel_on_sleep = Some((n, token));
        self
    }

    /// Cancel `token` from inside the `n`-th motion command (1-based).
    pub(crate) fn cancel_on_command(self, n: usize, token: CancelToken) -> Self {
        self.script().cancel_on_command = Some((n, token));
        self
    }

    pub(crate) fn fail_transforms(&self) {
        self.script().transform_fault = true;
    }

    pub(crate) fn commands(&self) -> Vec<MotionCommand> {
        self.script().commands.clone()
    }

    pub(crate) fn stops(&self) -> usize {
        self.script().commands.iter().filter(|c| c.is_stop()).count()
    }

    /// Commands issued after the scripted cancellation fired.
    pub(crate) fn commands_after_cancel(&self) -> Vec<MotionCommand> {
        let s = self.script();
        let from = s.commands_at_cancel.unwrap_or(s.commands.len());
        s.commands[from..].to_vec()
    }

    pub(crate) fn last_command(&self) -> Option<MotionCommand> {
        self.script().commands.last().copied()
    }

    pub(crate) fn sleeps(&self) -> Vec<f32> {
        self.script().sleeps.clone()
    }

    pub(crate) fn navigation(&self) -> Vec<Pose2D> {
        self.script().navigation.clone()
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl RobotPort for ScriptedRobot {
    fn drive(&self, command: MotionCommand) -> Result<(), MantisError> {
        let mut s = self.script();
        s.commands.push(command);
        let issued = s.commands.len();
        let trigger = s
            .cancel_on_command
            .as_ref()
            .filter(|(n, _)| *n == issued)
            .map(|(_, token)| token.clone());
        if let Some(token) = trigger {
            token.cancel();
            s.commands_at_cancel = Some(issued);
        }
        Ok(())
    }

    fn sleep(&self, seconds: f32) -> Result<(), MantisError> {
        let mut s = self.script();
        s.sleeps.push(seconds);
        let taken = s.sleeps.len();
        if let Some((n, token)) = &s.cancel_on_sleep
            && *n == taken
        {
            token.cancel();
            let issued = s.commands.len();
            s.commands_at_cancel = Some(issued);
        }
        Ok(())
    }

    fn pose(&self) -> Result<Pose2D, MantisError> {
        let mut s = self.script();
        let pose = if s.poses.len() > 1 {
            s.poses.pop_front()
        } else {
            s.poses.front().copied()
        };
        Ok(pose.unwrap_or(Pose2D::new(0.0, 0.0, 0.0)))
    }

    fn transform(&self, target_frame: &str, source_frame: &str) -> Result<Transform3D, MantisError> {
        let s = self.script();
        if s.transform_fault {
            return Err(MantisError::TransformUnavailable {
                target_frame: target_frame.to_string(),
                source_frame: source_frame.to_string(),
            });
        }
        Ok(s.transforms
            .get(&(target_frame.to_string(), source_frame.to_string()))
            .copied()
            .unwrap_or_else(Transform3D::identity))
    }

    fn sample_distance(&self) -> Result<f32, MantisError> {
        Ok(self.script().distances.first().copied().unwrap_or(f32::INFINITY))
    }

    fn subscribe_distance(&self) -> Result<SampleStream<f32>, MantisError> {
        let releases = Arc::clone(&self.releases);
        let release = move || {
            releases.fetch_add(1, Ordering::SeqCst);
        };
        let mut s = self.script();
        if !s.stall_feed {
            return Ok(SampleStream::from_samples(s.distances.clone(), release));
        }
        let (tx, stream) = SampleStream::channel(s.distances.len(), release);
        for d in s.distances.clone() {
            tx.send(d);
        }
        s.feed_sender = Some(tx);
        Ok(stream)
    }

    fn sample_detection(&self) -> Result<Sighting, MantisError> {
        Ok(self.script().sightings.pop_front().unwrap_or(Sighting::Missed))
    }

    fn detections(&self) -> Result<DetectionFrame, MantisError> {
        Ok(self.script().frame.clone())
    }

    fn depth_at(&self, _col: u32, _row: u32) -> Result<f32, MantisError> {
        Ok(self.script().depth)
    }

    fn depth_row(&self) -> Result<DepthRow, MantisError> {
        Ok(self.script().depth_row.clone())
    }

    fn named_position(&self, name: &str) -> Result<Pose2D, MantisError> {
        match name {
            "dock" => Ok(Pose2D::new(2.0, 1.0, 0.5)),
            _ => Err(MantisError::UnknownPosition(name.to_string())),
        }
    }

    fn navigate_to(&self, goal: Pose2D) -> Result<(), MantisError> {
        self.script().navigation.push(goal);
        Ok(())
    }
}
