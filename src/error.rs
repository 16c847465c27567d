use thiserror::Error;

/// Errors raised while configuring a steering behavior. These are
/// returned from constructors and setters, never from the per-tick
/// systems, so a bad configuration is rejected before it can run.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SteeringConfigError {
    #[error("neighbors were requested from the agent's team, but the agent has no team")]
    MissingTeam,
    #[error("max distance can not be negative, got {0}")]
    NegativeMaxDistance(f32),
    #[error("min distance can not be negative, got {0}")]
    NegativeMinDistance(f32),
    #[error("min time to collision must be positive, got {0}")]
    InvalidTimeToCollision(f32),
    #[error("max distance {max} is lower than min distance {min}")]
    InvertedDistanceRange { min: f32, max: f32 },
}

pub type SteeringResult<T> = Result<T, SteeringConfigError>;

/// Accepts zero and positive values (including infinity). NaN is rejected.
pub(crate) fn non_negative(value: f32) -> bool {
    value >= 0.0
}
