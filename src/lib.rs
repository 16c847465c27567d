mod agent;
mod behaviors;
mod control;
mod error;
mod kinematic;
mod movement;
mod neighbors;
mod obstacles;
mod plugin;
pub mod prelude;

/// Squared lengths below this are treated as zero before normalizing.
pub(crate) const SMALL_THRESHOLD: f32 = 0.0001;
