//! `mantis-perception` – turns raw observations into positions.
//!
//! Everything here is pure: no robot calls, no motion, no shared state.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine] and
//!   [`Transform3D`][transform::Transform3D]: rigid transforms between named
//!   reference frames, applied to [`Point`][mantis_types::Point]s.
//! - [`consensus`] – [`ClusterSet`][consensus::ClusterSet]: majority vote by
//!   proximity over repeated noisy observations.
//! - [`projection`] – fixed-baseline and pinhole back-projection from pixels
//!   and depth to metric offsets.
//! - [`selector`] – [`select_target`][selector::select_target]: picks one
//!   detection by label, confidence and proximity to the image center.

pub mod consensus;
pub mod projection;
pub mod selector;
pub mod transform;

pub use consensus::{Cluster, ClusterSet};
pub use projection::{BaselineProjection, CameraIntrinsics, PlanarOffset, nearest_column, pixel_to_offset};
pub use selector::select_target;
pub use transform::{Quaternion, TfEngine, Transform3D, Vec3};
