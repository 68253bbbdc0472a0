//! In-process simulated robot for tests and the CLI.
//!
//! [`SimRobot`] implements [`RobotPort`] on top of a unicycle kinematic model
//! driven by a simulated clock: [`RobotPort::sleep`] advances time instantly,
//! integrating whatever velocity command is active.  Objects live in the
//! working frame; detections, depth samples and range feeds are derived from
//! the geometry.  Fault-injection and inspection hooks let tests script
//! failures and assert on the commands the controllers issued.
//!
//! # Example
//!
//! ```rust
//! use mantis_hal::{RobotPort, sim::SimRobot};
//! use mantis_types::{MotionCommand, Sign};
//!
//! let robot = SimRobot::default();
//! robot.drive(MotionCommand::walk(Sign::Positive, false)).unwrap();
//! robot.sleep(2.0).unwrap();
//! robot.drive(MotionCommand::stop()).unwrap();
//!
//! // 0.1 m/s for 2 s.
//! assert!((robot.pose().unwrap().x - 0.2).abs() < 1e-4);
//! ```

use std::collections::VecDeque;
use std::f32::consts::FRAC_PI_2;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mantis_perception::{CameraIntrinsics, Quaternion, TfEngine, Transform3D, Vec3};
use mantis_types::{
    DepthRow, Detection, DetectionFrame, MantisError, MotionCommand, Point, Pose2D, Sighting, wrap_angle,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::port::RobotPort;
use crate::stream::SampleStream;

/// Deterministic jitter pattern applied to successive detections, in units of
/// [`SimSettings::detection_jitter`].
const JITTER_PATTERN: [f32; 5] = [0.0, 1.0, -1.0, 0.5, -0.5];

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

/// An object placed in the working frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObject {
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A named map location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPose {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

/// World and robot description for [`SimRobot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Initial pose in the working frame.
    pub start: Pose2D,
    /// Linear speed at normal speed (m/s).
    pub linear_speed: f32,
    /// Linear speed at high speed (m/s).
    pub high_speed: f32,
    /// Turn rate (rad/s).
    pub turn_rate: f32,
    pub working_frame: String,
    pub base_frame: String,
    pub camera_frame: String,
    /// Camera position in the base frame.
    pub camera_offset: [f32; 3],
    pub intrinsics: CameraIntrinsics,
    /// Objects further than this are not seen (m).
    pub max_range: f32,
    /// Half-width of the corridor swept by the range sensor (m).
    pub corridor_half_width: f32,
    pub object_radius: f32,
    pub detection_score: f32,
    /// Amplitude of the deterministic jitter added to single-shot sightings.
    pub detection_jitter: f32,
    /// Every n-th single-shot sighting is a miss.  `0` disables misses.
    pub miss_every: u32,
    /// Simulated time between two samples of the range feed (s).
    pub stream_period_secs: f32,
    /// Samples produced per range-feed subscription.
    pub stream_limit: usize,
    pub objects: Vec<SimObject>,
    pub named_positions: Vec<NamedPose>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            start: Pose2D::new(0.0, 0.0, 0.0),
            linear_speed: 0.1,
            high_speed: 0.2,
            turn_rate: 1.0,
            working_frame: "map".to_string(),
            base_frame: "base_link".to_string(),
            camera_frame: "camera_color_optical_frame".to_string(),
            camera_offset: [0.1, 0.0, 0.3],
            intrinsics: CameraIntrinsics::default(),
            max_range: 3.0,
            corridor_half_width: 0.15,
            object_radius: 0.04,
            detection_score: 0.9,
            detection_jitter: 0.0,
            miss_every: 0,
            stream_period_secs: 0.05,
            stream_limit: 10_000,
            objects: vec![SimObject {
                label: "work".to_string(),
                x: 1.5,
                y: 0.0,
                z: 0.3,
            }],
            named_positions: vec![
                NamedPose {
                    name: "rack_workpiece".to_string(),
                    x: 0.5,
                    y: 0.0,
                    heading: 0.0,
                },
                NamedPose {
                    name: "machining_center".to_string(),
                    x: 0.0,
                    y: 2.0,
                    heading: FRAC_PI_2,
                },
            ],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimState {
    pose: Pose2D,
    command: MotionCommand,
    clock: f64,
    commands: Vec<MotionCommand>,
    stops: usize,
    open_streams: usize,
    stream_releases: usize,
    sightings_taken: u32,
    scripted: VecDeque<Sighting>,
    navigation_goals: Vec<Pose2D>,
    transform_fault: bool,
    sensor_fault: bool,
    motion_fault: bool,
}

impl SimState {
    fn new(start: Pose2D) -> Self {
        Self {
            pose: start,
            command: MotionCommand::stop(),
            clock: 0.0,
            commands: Vec::new(),
            stops: 0,
            open_streams: 0,
            stream_releases: 0,
            sightings_taken: 0,
            scripted: VecDeque::new(),
            navigation_goals: Vec::new(),
            transform_fault: false,
            sensor_fault: false,
            motion_fault: false,
        }
    }

    /// Advance the pose by `dt` seconds under the active command.
    fn integrate(&mut self, settings: &SimSettings, dt: f32) {
        let dt = dt.max(0.0);
        let speed = if self.command.high_speed {
            settings.high_speed
        } else {
            settings.linear_speed
        };
        let v = self.command.direction.as_f32() * speed;
        let w = self.command.turn.as_f32() * settings.turn_rate;
        let h = self.pose.heading;

        if w == 0.0 {
            self.pose.x += v * h.cos() * dt;
            self.pose.y += v * h.sin() * dt;
        } else {
            let h1 = h + w * dt;
            self.pose.x += v / w * (h1.sin() - h.sin());
            self.pose.y -= v / w * (h1.cos() - h.cos());
            self.pose.heading = wrap_angle(h1);
        }
        self.clock += f64::from(dt);
    }

    fn frames(&self, settings: &SimSettings) -> TfEngine {
        let [cx, cy, cz] = settings.camera_offset;
        let mut tf = TfEngine::new();
        tf.set_transform(
            &settings.working_frame,
            &settings.base_frame,
            Transform3D::from_pose(self.pose),
        );
        // Optical frame: z forward, x right, y down.
        tf.set_transform(
            &settings.base_frame,
            &settings.camera_frame,
            Transform3D::new(Vec3::new(cx, cy, cz), Quaternion::new(0.5, -0.5, 0.5, -0.5)),
        );
        tf
    }

    /// Objects expressed in `frame`, paired with their labels.
    fn objects_in<'s>(&self, settings: &'s SimSettings, frame: &str) -> Vec<(&'s str, Point)> {
        let Some(t) = self.frames(settings).lookup(frame, &settings.working_frame) else {
            return Vec::new();
        };
        settings
            .objects
            .iter()
            .map(|o| (o.label.as_str(), t.apply(&Point::new(o.x, o.y, o.z))))
            .collect()
    }

    fn range_ahead(&self, settings: &SimSettings) -> f32 {
        self.objects_in(settings, &settings.base_frame)
            .into_iter()
            .map(|(_, p)| p)
            .filter(|p| p.x > 0.0 && p.y.abs() <= settings.corridor_half_width)
            .map(|p| p.x)
            .fold(f32::INFINITY, f32::min)
    }

    /// Image-space footprint of every object in front of the camera:
    /// `(label, u, v, depth, half_width_px)`.
    fn footprints<'s>(&self, settings: &'s SimSettings) -> Vec<(&'s str, f32, f32, f32, f32)> {
        let k = &settings.intrinsics;
        self.objects_in(settings, &settings.camera_frame)
            .into_iter()
            .filter(|(_, p)| p.z > 0.0 && p.z <= settings.max_range)
            .filter_map(|(label, p)| {
                let (u, v) = k.project(&p)?;
                Some((label, u, v, p.z, k.fx * settings.object_radius / p.z))
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRobot
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimInner {
    settings: SimSettings,
    state: Mutex<SimState>,
}

/// A simulated mobile base with an RGB-D camera.  Cloning shares the same
/// simulated world.
#[derive(Debug, Clone)]
pub struct SimRobot {
    inner: Arc<SimInner>,
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new(SimSettings::default())
    }
}

impl SimRobot {
    pub fn new(settings: SimSettings) -> Self {
        let state = SimState::new(settings.start);
        Self {
            inner: Arc::new(SimInner {
                settings,
                state: Mutex::new(state),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &SimSettings {
        &self.inner.settings
    }

    // ── Fault injection ─────────────────────────────────────────────────────

    /// Make every transform lookup fail (or succeed again).
    pub fn fail_transforms(&self, fail: bool) {
        self.state().transform_fault = fail;
    }

    /// Make every sensor call fail (or succeed again).
    pub fn fail_sensors(&self, fail: bool) {
        self.state().sensor_fault = fail;
    }

    /// Make every drive command fail (or succeed again).
    pub fn fail_motion(&self, fail: bool) {
        self.state().motion_fault = fail;
    }

    /// Queue sightings returned by [`RobotPort::sample_detection`] before the
    /// geometry is consulted.
    pub fn script_sightings(&self, sightings: impl IntoIterator<Item = Sighting>) {
        self.state().scripted.extend(sightings);
    }

    pub fn set_pose(&self, pose: Pose2D) {
        self.state().pose = pose;
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    pub fn current_pose(&self) -> Pose2D {
        self.state().pose
    }

    /// Every drive command issued so far, in order.
    pub fn commands(&self) -> Vec<MotionCommand> {
        self.state().commands.clone()
    }

    /// Number of stop commands issued so far.
    pub fn stop_count(&self) -> usize {
        self.state().stops
    }

    /// `true` when the last command left the base in motion.
    pub fn is_moving(&self) -> bool {
        !self.state().command.is_stop()
    }

    pub fn open_streams(&self) -> usize {
        self.state().open_streams
    }

    pub fn stream_releases(&self) -> usize {
        self.state().stream_releases
    }

    pub fn navigation_goals(&self) -> Vec<Pose2D> {
        self.state().navigation_goals.clone()
    }

    /// Simulated seconds elapsed.
    pub fn clock(&self) -> f64 {
        self.state().clock
    }

    fn sensor_check(&self, state: &SimState, sensor: &str) -> Result<(), MantisError> {
        if state.sensor_fault {
            return Err(MantisError::SensorUnavailable {
                sensor: sensor.to_string(),
                details: "simulated sensor fault".to_string(),
            });
        }
        Ok(())
    }
}

impl RobotPort for SimRobot {
    fn drive(&self, command: MotionCommand) -> Result<(), MantisError> {
        let mut state = self.state();
        if state.motion_fault {
            return Err(MantisError::MotionFault("simulated drive fault".to_string()));
        }
        debug!(?command, "sim drive");
        state.commands.push(command);
        if command.is_stop() {
            state.stops += 1;
        }
        state.command = command;
        Ok(())
    }

    fn sleep(&self, seconds: f32) -> Result<(), MantisError> {
        let settings = &self.inner.settings;
        self.state().integrate(settings, seconds);
        Ok(())
    }

    fn pose(&self) -> Result<Pose2D, MantisError> {
        Ok(self.state().pose)
    }

    fn transform(&self, target_frame: &str, source_frame: &str) -> Result<Transform3D, MantisError> {
        let state = self.state();
        let unavailable = || MantisError::TransformUnavailable {
            target_frame: target_frame.to_string(),
            source_frame: source_frame.to_string(),
        };
        if state.transform_fault {
            return Err(unavailable());
        }
        state
            .frames(&self.inner.settings)
            .lookup(target_frame, source_frame)
            .ok_or_else(unavailable)
    }

    fn sample_distance(&self) -> Result<f32, MantisError> {
        let state = self.state();
        self.sensor_check(&state, "range")?;
        Ok(state.range_ahead(&self.inner.settings))
    }

    fn subscribe_distance(&self) -> Result<SampleStream<f32>, MantisError> {
        {
            let mut state = self.state();
            self.sensor_check(&state, "range")?;
            state.open_streams += 1;
        }

        let on_release = Arc::clone(&self.inner);
        let (tx, stream) = SampleStream::channel(1, move || {
            let mut state = on_release.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.open_streams -= 1;
            state.stream_releases += 1;
        });

        let producer = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            let settings = &producer.settings;
            for _ in 0..settings.stream_limit {
                let sample = {
                    let mut state = producer.state.lock().unwrap_or_else(PoisonError::into_inner);
                    state.integrate(settings, settings.stream_period_secs);
                    state.range_ahead(settings)
                };
                if !tx.send(sample) {
                    break;
                }
            }
        });

        Ok(stream)
    }

    fn sample_detection(&self) -> Result<Sighting, MantisError> {
        let settings = &self.inner.settings;
        let mut state = self.state();
        self.sensor_check(&state, "detector")?;
        if let Some(scripted) = state.scripted.pop_front() {
            return Ok(scripted);
        }

        state.sightings_taken += 1;
        let taken = state.sightings_taken;
        if settings.miss_every > 0 && taken % settings.miss_every == 0 {
            return Ok(Sighting::Missed);
        }

        let half_fov = (settings.intrinsics.cx / settings.intrinsics.fx).atan();
        let nearest = state
            .objects_in(settings, &settings.base_frame)
            .into_iter()
            .map(|(_, p)| p)
            .filter(|p| p.x > 0.0 && p.planar_norm() <= settings.max_range)
            .filter(|p| p.y.atan2(p.x).abs() <= half_fov)
            .min_by(|a, b| a.planar_norm().total_cmp(&b.planar_norm()));

        Ok(match nearest {
            Some(p) => {
                let j = JITTER_PATTERN[taken as usize % JITTER_PATTERN.len()] * settings.detection_jitter;
                let range = p.planar_norm();
                Sighting::Seen(Point::new(p.x + j, p.y + j, p.z).with_distance(range))
            }
            None => Sighting::Absent,
        })
    }

    fn detections(&self) -> Result<DetectionFrame, MantisError> {
        let settings = &self.inner.settings;
        let state = self.state();
        self.sensor_check(&state, "detector")?;
        let k = &settings.intrinsics;
        let detections = state
            .footprints(settings)
            .into_iter()
            .filter(|(_, u, v, _, _)| k.contains(*u, *v))
            .map(|(label, u, v, _, half)| Detection {
                label: label.to_string(),
                score: settings.detection_score,
                center_x: u,
                center_y: v,
                width: 2.0 * half,
                height: 2.0 * half,
            })
            .collect();
        Ok(DetectionFrame {
            width: k.width,
            height: k.height,
            detections,
        })
    }

    fn depth_at(&self, col: u32, row: u32) -> Result<f32, MantisError> {
        let settings = &self.inner.settings;
        let state = self.state();
        self.sensor_check(&state, "depth")?;
        let (col, row) = (col as f32, row as f32);
        Ok(state
            .footprints(settings)
            .into_iter()
            .filter(|(_, u, v, _, half)| (u - col).abs() <= *half && (v - row).abs() <= *half)
            .map(|(_, _, _, depth, _)| depth)
            .fold(f32::INFINITY, f32::min))
    }

    fn depth_row(&self) -> Result<DepthRow, MantisError> {
        let settings = &self.inner.settings;
        let state = self.state();
        self.sensor_check(&state, "depth")?;
        let width = settings.intrinsics.width as usize;
        let mut values = vec![f32::INFINITY; width];
        // Objects are treated as vertical columns reaching the bottom row.
        for (_, u, _, depth, half) in state.footprints(settings) {
            let first = (u - half).ceil().max(0.0) as usize;
            let last = (u + half).floor();
            if last < 0.0 {
                continue;
            }
            let last = (last as usize).min(width.saturating_sub(1));
            for value in values.iter_mut().take(last + 1).skip(first) {
                *value = value.min(depth);
            }
        }
        Ok(DepthRow::new(values))
    }

    fn named_position(&self, name: &str) -> Result<Pose2D, MantisError> {
        self.inner
            .settings
            .named_positions
            .iter()
            .find(|p| p.name == name)
            .map(|p| Pose2D::new(p.x, p.y, p.heading))
            .ok_or_else(|| MantisError::UnknownPosition(name.to_string()))
    }

    fn navigate_to(&self, goal: Pose2D) -> Result<(), MantisError> {
        let mut state = self.state();
        debug!(x = goal.x, y = goal.y, heading = goal.heading, "sim navigate");
        state.navigation_goals.push(goal);
        state.pose = Pose2D::new(goal.x, goal.y, wrap_angle(goal.heading));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
