//! `mantis-hal` – the robot boundary.
//!
//! The control core never touches a drive, a camera or a transform tree
//! directly.  It goes through [`RobotPort`], a synchronous-looking facade
//! that a runtime implements on top of whatever middleware the robot speaks.
//!
//! # Modules
//!
//! - [`port`] – the [`RobotPort`] trait.
//! - [`stream`] – [`SampleStream`]: a scoped, push-based sample subscription
//!   released exactly once on drop, with a bounded [`recv_timeout`][SampleStream::recv_timeout].
//! - [`sim`] – [`SimRobot`][sim::SimRobot]: an in-process simulated base with
//!   an RGB-D camera, used by the tests and the CLI.

pub mod port;
pub mod sim;
pub mod stream;

pub use port::RobotPort;
pub use sim::{NamedPose, SimObject, SimRobot, SimSettings};
pub use stream::{Recv, SampleSender, SampleStream};
