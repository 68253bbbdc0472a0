//! `mantis-control` – closed-loop controllers that turn noisy perception into
//! robot motion.
//!
//! Everything hangs off a [`Controller`], which owns a
//! [`RobotPort`][mantis_hal::RobotPort], the [`ControlConfig`], a shared
//! [`MotionLock`][mantis_kernel::MotionLock] and a
//! [`CancelToken`][mantis_kernel::CancelToken].  Each operation returns
//! `Ok(report)` on convergence or a [`ControlError`] whose
//! [`status`][ControlError::status] is the terminal status for the caller.
//! On every failure path the base has been stopped before the error is
//! returned.
//!
//! # Modules
//!
//! - [`align`] – heading alignment, face-the-point and face-the-target.
//! - [`approach`] – coarse straight-line approach on re-measured transforms.
//! - [`visual`] – visual-servo approach on a streamed range feed.
//! - [`shift`] – one-shot standoff correction from the depth image.
//! - [`consensus`] – majority vote over repeated sightings.
//! - [`locate`] – detection and depth-row localisation.
//! - [`telemetry`] – tracing and OTLP initialisation.
//!
//! # Example
//!
//! ```rust
//! use mantis_control::{ControlConfig, Controller, TerminalStatus};
//! use mantis_hal::sim::SimRobot;
//!
//! let ctl = Controller::new(SimRobot::default(), ControlConfig::default());
//!
//! let target = ctl.locate_target().unwrap();
//! let result = ctl.approach(target.base_point, 0.95);
//! assert_eq!(TerminalStatus::of(&result), TerminalStatus::Converged);
//! ```

pub mod align;
pub mod approach;
pub mod config;
pub mod consensus;
pub mod controller;
pub mod error;
pub mod locate;
pub mod shift;
pub mod telemetry;
pub mod visual;

#[cfg(test)]
mod test_support;

pub use align::{AlignReport, FaceReport};
pub use approach::ApproachReport;
pub use config::ControlConfig;
pub use consensus::ConsensusReport;
pub use controller::Controller;
pub use error::{ControlError, ControlResult, TerminalStatus};
pub use locate::{CenterFix, LocatedTarget};
pub use shift::ShiftReport;
pub use visual::VisualReport;
