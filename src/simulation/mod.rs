mod clock;
mod field;
mod pointer;
pub mod topology;

pub use clock::FrameClock;
pub use field::{DisplacementField, Falloff, FieldInit};
pub use pointer::{PointerEvent, PointerState, PointerTracker};
pub use topology::{ChannelLayout, GridDimensions, GridSizing};
