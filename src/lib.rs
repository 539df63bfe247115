//! Interactive displacement-field simulation with deterministic record and
//! replay.
//!
//! The [`Simulation`] owns a grid of displacement vectors that decays every
//! step and is pushed around by pointer input. Steps can be captured into a
//! fixed-capacity [`recording::RecordingBuffer`] and played back frame by
//! frame. A renderer reads each tick's [`Snapshot`] and nothing else.

pub mod config;
pub mod engine;
pub mod error;
pub mod recording;
pub mod simulation;

pub use config::{FieldParams, SimConfig};
pub use engine::{Simulation, Snapshot};
pub use error::{WarpError, WarpResult};
