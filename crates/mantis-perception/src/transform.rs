//! Transform Frame (TF) Engine.
//!
//! Maintains a graph of named reference frames and the 3-D rigid-body
//! transforms (translation + quaternion rotation) that relate them.  Given any
//! two frame names the engine composes the chain of transforms between them,
//! walking edges in either direction, and returns a single [`Transform3D`]
//! that maps points from the source frame into the target frame.
//!
//! # Example
//!
//! ```rust
//! use mantis_perception::transform::{TfEngine, Transform3D, Vec3, Quaternion};
//! use mantis_types::Point;
//!
//! let mut tf = TfEngine::new();
//!
//! // base_link is 1 m forward of the map origin, same orientation.
//! tf.set_transform("map", "base_link",
//!     Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()));
//!
//! // A point 0.5 m ahead of the robot, expressed on the map.
//! let t = tf.lookup("map", "base_link").unwrap();
//! let p = t.apply(&Point::planar(0.5, 0.0));
//! assert!((p.x - 1.5).abs() < 1e-5);
//!
//! // The inverse direction is resolved too.
//! let back = tf.lookup("base_link", "map").unwrap().apply(&p);
//! assert!((back.x - 0.5).abs() < 1e-5);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use mantis_types::{Point, Pose2D};

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `yaw` radians around +Z.
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Heading of the rotated +X axis projected onto the ground plane.
    pub fn yaw(self) -> f32 {
        let siny = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny.atan2(cosy)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// The transform that places a frame at `pose` on the ground plane.
    pub fn from_pose(pose: Pose2D) -> Self {
        Self::new(
            Vec3::new(pose.x, pose.y, 0.0),
            Quaternion::from_yaw(pose.heading),
        )
    }

    /// Compose two transforms.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// T_B_A from T_A_B.
    pub fn inverse(self) -> Self {
        let rotation = self.rotation.conjugate();
        let translation = rotation.rotate(self.translation).neg();
        Self::new(translation, rotation)
    }

    /// Express `point` in the destination frame.
    ///
    /// Pure: the input is untouched, and `distance`/`valid` carry over to the
    /// returned point.
    pub fn apply(&self, point: &Point) -> Point {
        let moved = self
            .rotation
            .rotate(Vec3::new(point.x, point.y, point.z))
            .add(self.translation);
        Point {
            x: moved.x,
            y: moved.y,
            z: moved.z,
            distance: point.distance,
            valid: point.valid,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A graph of named reference frames and the [`Transform3D`]s that relate
/// them.
///
/// Each edge is registered as parent → child (the pose of the child in the
/// parent frame) and can be walked in both directions; the reverse direction
/// uses [`Transform3D::inverse`].
#[derive(Debug, Default, Clone)]
pub struct TfEngine {
    /// `edges[parent][child] = T_parent_child`
    edges: HashMap<String, HashMap<String, Transform3D>>,
    /// `parents[child] = parent`
    parents: HashMap<String, String>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` in `parent_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
        self.parents
            .insert(child_frame.to_string(), parent_frame.to_string());
    }

    /// Compute the [`Transform3D`] that maps points in `source_frame` into
    /// `target_frame`.
    ///
    /// Returns `None` if the frames are not connected.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<Transform3D> {
        if source_frame == target_frame {
            return Some(Transform3D::identity());
        }

        // BFS from the target; each queue item carries T_target_current.
        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((target_frame.to_string(), Transform3D::identity()));
        visited.insert(target_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            let mut steps: Vec<(String, Transform3D)> = Vec::new();
            if let Some(children) = self.edges.get(&current) {
                for (child, edge_tf) in children {
                    steps.push((child.clone(), *edge_tf));
                }
            }
            if let Some(parent) = self.parents.get(&current) {
                if let Some(edge_tf) = self.edges.get(parent).and_then(|c| c.get(&current)) {
                    steps.push((parent.clone(), edge_tf.inverse()));
                }
            }

            for (next, step_tf) in steps {
                if visited.contains(&next) {
                    continue;
                }
                let composed = accumulated.compose(step_tf);
                if next == source_frame {
                    return Some(composed);
                }
                visited.insert(next.clone());
                queue.push_back((next, composed));
            }
        }

        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
