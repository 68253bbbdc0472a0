//! Controller tunables.
//!
//! Every field has a serde default, so a partial TOML table (or none at all)
//! yields a working configuration.

use std::time::Duration;

use mantis_perception::CameraIntrinsics;
use serde::{Deserialize, Serialize};

/// Tunables shared by every controller on a [`Controller`][crate::Controller].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Alignment convergence threshold (rad).
    #[serde(default = "default_angle_epsilon")]
    pub angle_epsilon: f32,

    /// Seconds of motion per step unit of the stepping primitives.
    #[serde(default = "default_unit_secs")]
    pub unit_secs: f32,

    /// Units per forward step of the coarse approach.
    #[serde(default = "default_walk_step_units")]
    pub walk_step_units: f32,

    /// Units per turn pulse of the alignment loop.  One pulse must rotate
    /// less than `2 * angle_epsilon` or the loop can oscillate forever.
    #[serde(default = "default_turn_step_units")]
    pub turn_step_units: f32,

    /// Coarse approach stops once the forward distance falls below this.
    #[serde(default = "default_approach_near_threshold")]
    pub approach_near_threshold: f32,

    /// Step units commanded per metre of shift error.
    #[serde(default = "default_shift_gain")]
    pub shift_gain: f32,

    /// Shift errors smaller than this are left uncorrected (m).
    #[serde(default = "default_shift_tolerance")]
    pub shift_tolerance: f32,

    #[serde(default = "default_shift_settle_secs")]
    pub shift_settle_secs: f32,

    #[serde(default = "default_visual_settle_secs")]
    pub visual_settle_secs: f32,

    /// Added to the bearing of a detected target when facing it (rad).
    /// Compensates the camera sitting slightly off the base centreline.
    #[serde(default = "default_bearing_bias")]
    pub bearing_bias: f32,

    /// Detection attempts before facing the target gives up.
    #[serde(default = "default_locate_attempts")]
    pub locate_attempts: usize,

    /// Pause between detection attempts (s).
    #[serde(default = "default_locate_retry_secs")]
    pub locate_retry_secs: f32,

    /// Squared merge radius for consensus clustering.
    #[serde(default = "default_cluster_radius_sq")]
    pub cluster_radius_sq: f32,

    /// Iteration budget of every loop, and attempt budget of consensus
    /// gathering.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock budget of every loop.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f32,

    /// Sample budget of the visual-servo approach.
    #[serde(default = "default_max_stream_samples")]
    pub max_stream_samples: usize,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    #[serde(default = "default_target_label")]
    pub target_label: String,

    /// Baseline (pixels) of the fixed-baseline back-projection.
    #[serde(default = "default_baseline_px")]
    pub baseline_px: f32,

    #[serde(default = "default_working_frame")]
    pub working_frame: String,

    #[serde(default = "default_base_frame")]
    pub base_frame: String,

    #[serde(default = "default_camera_frame")]
    pub camera_frame: String,

    #[serde(default)]
    pub intrinsics: CameraIntrinsics,
}

fn default_angle_epsilon() -> f32 {
    0.02
}
fn default_unit_secs() -> f32 {
    0.1
}
fn default_walk_step_units() -> f32 {
    5.0
}
fn default_turn_step_units() -> f32 {
    0.2
}
fn default_approach_near_threshold() -> f32 {
    0.95
}
fn default_shift_gain() -> f32 {
    164.0
}
fn default_shift_tolerance() -> f32 {
    0.005
}
fn default_shift_settle_secs() -> f32 {
    3.0
}
fn default_visual_settle_secs() -> f32 {
    5.0
}
fn default_bearing_bias() -> f32 {
    1.05_f32.to_radians()
}
fn default_locate_attempts() -> usize {
    10
}
fn default_locate_retry_secs() -> f32 {
    1.0
}
fn default_cluster_radius_sq() -> f32 {
    mantis_perception::consensus::DEFAULT_RADIUS_SQ
}
fn default_max_iterations() -> usize {
    400
}
fn default_max_duration_secs() -> f32 {
    120.0
}
fn default_max_stream_samples() -> usize {
    2000
}
fn default_min_confidence() -> f32 {
    0.4
}
fn default_target_label() -> String {
    "work".to_string()
}
fn default_baseline_px() -> f32 {
    mantis_perception::projection::DEFAULT_BASELINE_PX
}
fn default_working_frame() -> String {
    "map".to_string()
}
fn default_base_frame() -> String {
    "base_link".to_string()
}
fn default_camera_frame() -> String {
    "camera_color_optical_frame".to_string()
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            angle_epsilon: default_angle_epsilon(),
            unit_secs: default_unit_secs(),
            walk_step_units: default_walk_step_units(),
            turn_step_units: default_turn_step_units(),
            approach_near_threshold: default_approach_near_threshold(),
            shift_gain: default_shift_gain(),
            shift_tolerance: default_shift_tolerance(),
            shift_settle_secs: default_shift_settle_secs(),
            visual_settle_secs: default_visual_settle_secs(),
            bearing_bias: default_bearing_bias(),
            locate_attempts: default_locate_attempts(),
            locate_retry_secs: default_locate_retry_secs(),
            cluster_radius_sq: default_cluster_radius_sq(),
            max_iterations: default_max_iterations(),
            max_duration_secs: default_max_duration_secs(),
            max_stream_samples: default_max_stream_samples(),
            min_confidence: default_min_confidence(),
            target_label: default_target_label(),
            baseline_px: default_baseline_px(),
            working_frame: default_working_frame(),
            base_frame: default_base_frame(),
            camera_frame: default_camera_frame(),
            intrinsics: CameraIntrinsics::default(),
        }
    }
}

impl ControlConfig {
    /// Wall-clock budget as a [`Duration`].  Negative or non-finite values
    /// collapse to zero.
    pub fn max_duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.max_duration_secs.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calibration() {
        let cfg = ControlConfig::default();
        assert_eq!(cfg.angle_epsilon, 0.02);
        assert_eq!(cfg.approach_near_threshold, 0.95);
        assert_eq!(cfg.shift_gain, 164.0);
        assert_eq!(cfg.cluster_radius_sq, 0.01);
        assert_eq!(cfg.baseline_px, 500.0);
        assert_eq!(cfg.target_label, "work");
        assert_eq!(cfg.working_frame, "map");
        assert_eq!(cfg.locate_attempts, 10);
        assert!((cfg.bearing_bias.to_degrees() - 1.05).abs() < 1e-4);
    }

    #[test]
    fn turn_pulse_fits_inside_convergence_band() {
        let cfg = ControlConfig::default();
        // Turn rate of 1 rad/s.
        assert!(cfg.turn_step_units * cfg.unit_secs < 2.0 * cfg.angle_epsilon);
    }

    #[test]
    fn max_duration_handles_bad_values() {
        let mut cfg = ControlConfig::default();
        assert_eq!(cfg.max_duration(), Duration::from_secs(120));
        cfg.max_duration_secs = -3.0;
        assert_eq!(cfg.max_duration(), Duration::ZERO);
        cfg.max_duration_secs = f32::NAN;
        assert_eq!(cfg.max_duration(), Duration::ZERO);
    }
}
