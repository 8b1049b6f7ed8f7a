//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace:
//! pose data model, control commands, synthesized frames, configuration
//! blueprint, and the `SequenceModel` / `FrameSink` seams.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Pose layout
//! - A pose frame is `joint_count * joint_dim` `f32` values in joint-index order
//! - Rotation channels store unit quaternions as `(w, x, y, z)`

mod blueprint;
mod command;
mod engine_config;
mod error;
mod frame;
mod model;
mod pose;
mod sink;

pub use blueprint::*;
pub use command::*;
pub use engine_config::*;
pub use error::*;
pub use frame::*;
pub use model::{NormalizedWindow, SequenceModel};
pub use pose::*;
pub use sink::*;
