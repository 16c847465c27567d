use bevy::{ecs::query::QueryData, prelude::*};
use derivative::Derivative;
use enum_map::{Enum, EnumMap};
use rand::{SeedableRng, rngs::StdRng};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Enum representing the different types of steering behaviors.
#[derive(Debug, Copy, Clone, Enum, Hash, PartialEq, Eq, Display, EnumIter)]
pub enum BehaviorType {
    Alignment,
    ObstacleAvoidance,
}

/// Global configuration for the steering systems.
#[derive(Resource, Debug, Clone, Reflect, Derivative)]
#[derivative(Default)]
#[reflect(Resource)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct SteeringSettings {
    /// The fixed per-step time constant used to turn an agent's speed
    /// into the look-ahead distance of obstacle avoidance. When `None`,
    /// the timestep of `Time<Fixed>` is used. This is never the
    /// variable delta of the current frame.
    pub frame_time: Option<f32>,
    /// The local axis agents consider "forward". Defaults to +Z.
    #[derivative(Default(value = "Vec3::Z"))]
    pub forward_axis: Vec3,
    /// Whether the plugin applies [SteeringForce] to rigid bodies. Turn
    /// this off to drive agents with your own motion system.
    #[derivative(Default(value = "true"))]
    pub apply_forces: bool,
}

impl SteeringSettings {
    pub fn with_frame_time(mut self, frame_time: f32) -> Self {
        self.frame_time = Some(frame_time);
        self
    }

    pub fn with_forward_axis(mut self, axis: Vec3) -> Self {
        self.forward_axis = axis;
        self
    }

    pub fn with_apply_forces(mut self, apply_forces: bool) -> Self {
        self.apply_forces = apply_forces;
        self
    }

    pub(crate) fn frame_time(&self, fixed_time: &Time<Fixed>) -> f32 {
        self.frame_time
            .unwrap_or_else(|| fixed_time.timestep().as_secs_f32())
    }
}

/// The random source used by behaviors to break ties. Insert a seeded
/// one to make steering reproducible.
#[derive(Resource, Debug, Clone)]
pub struct SteeringRng(pub(crate) StdRng);

impl SteeringRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for SteeringRng {
    fn default() -> Self {
        Self(StdRng::from_os_rng())
    }
}

/// The output of one behavior for the current tick.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct WeightedSteering {
    /// The raw, unweighted steering vector.
    pub raw: Vec3,
    /// The strength of the behavior that produced it.
    pub strength: f32,
}

impl WeightedSteering {
    pub fn weighted(&self) -> Vec3 {
        self.raw * self.strength
    }
}

/// Represents the outputs of the steering behaviors of one agent. Each
/// enabled behavior writes its slot every tick; a disabled behavior's
/// slot is cleared.
#[derive(Component, Default, Debug, Copy, Clone)]
pub struct SteeringOutputs {
    values: EnumMap<BehaviorType, Option<WeightedSteering>>,
}

impl SteeringOutputs {
    pub fn get(&self, behavior: BehaviorType) -> Option<WeightedSteering> {
        self.values[behavior]
    }

    pub(crate) fn set(&mut self, behavior: BehaviorType, raw: Vec3, strength: f32) {
        self.values[behavior] = Some(WeightedSteering { raw, strength });
    }

    pub(crate) fn clear(&mut self, behavior: BehaviorType) {
        self.values[behavior] = None;
    }

    /// Returns true if any of the behavior outputs are set.
    pub fn has_some(&self) -> bool {
        self.values.iter().any(|(_, output)| output.is_some())
    }

    /// The sum of every set output, each scaled by its strength.
    pub fn combined(&self) -> Vec3 {
        self.values
            .values()
            .flatten()
            .map(WeightedSteering::weighted)
            .sum()
    }
}

/// The combined steering force of an agent for the current tick.
///
/// This is an acceleration-like velocity correction, in world units per
/// second squared, pointing where the agent should accelerate. It is not
/// a target position and it is not clamped. Multiply by the agent's mass
/// to get a physical force. Recomputed every tick; zero when no behavior
/// produced output.
#[derive(Component, Default, Debug, Copy, Clone, PartialEq, Deref)]
pub struct SteeringForce(pub(crate) Vec3);

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct CombineSteeringQuery {
    agent: Entity,
    outputs: &'static SteeringOutputs,
    force: &'static mut SteeringForce,
}

pub(crate) fn combine_steering_forces(mut query: Query<CombineSteeringQuery>) {
    for mut item in query.iter_mut() {
        let combined = item.outputs.combined();
        trace!("Combined steering force for {}: {combined}", item.agent);
        item.force.0 = combined;
    }
}

/// Draw each agent's combined steering force as an arrow.
pub(crate) fn debug_steering_forces(
    mut gizmos: Gizmos,
    query: Query<(&GlobalTransform, &SteeringForce)>,
) {
    const FORCE_COLOR: Color = Color::srgb(1.0, 1.0, 0.0);

    for (transform, force) in query.iter() {
        if force.0 == Vec3::ZERO {
            continue;
        }
        let position = transform.translation();
        gizmos.arrow(position, position + force.0, FORCE_COLOR);
    }
}
