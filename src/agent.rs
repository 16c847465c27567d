use bevy::prelude::*;
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::control::{SteeringForce, SteeringOutputs};

/// Determine how the agent will move. This only affects the built-in
/// motion system ([SteeringSettings::apply_forces](crate::prelude::SteeringSettings)).
/// For car-like agents, you should use the Directional mode. For simple
/// point-like agents, you should use the OmniDirectional mode.
#[derive(Copy, Clone, Debug, Default, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SteeringLocomotionMode {
    /// Forces can be applied in any direction. Torque will not be applied.
    #[default]
    OmniDirectional,
    /// Forces can only be applied along its forward axis. Torque
    /// is applied to turn the agent toward the steered heading.
    Directional,
}

/// Represents an autonomous agent. Agents are steered by behaviors
/// such as [Align](crate::prelude::Align) and [Avoid](crate::prelude::Avoid).
/// The behaviors write into [SteeringOutputs] and the combined
/// result ends up in [SteeringForce] once per fixed tick.
#[derive(Component, Clone, Debug, Reflect, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[derivative(Default)]
#[require(BoundingRadius, SteeringOutputs, SteeringForce)]
#[reflect(Component)]
pub struct SteeringAgent {
    /// How the agent will move through the world.
    pub(crate) locomotion_mode: SteeringLocomotionMode,
    /// The maximum force that can be applied to the agent. This
    /// represents, e.g. the power of the engine. If you want
    /// to disable movement along an axis, set the force to 0.
    #[derivative(Default(value = "Vec3::splat(100.0)"))]
    pub(crate) max_force: Vec3,
    /// The maximum torque that can be applied to the agent. Only
    /// used in directional mode.
    #[derivative(Default(value = "Vec3::splat(100.0)"))]
    pub(crate) max_torque: Vec3,
}

impl SteeringAgent {
    /// Set the agent to use a directional locomotion mode.
    pub fn directional(self) -> Self {
        Self {
            locomotion_mode: SteeringLocomotionMode::Directional,
            ..self
        }
    }

    /// Set the agent to use an omni-directional locomotion mode (the default).
    pub fn omni_directional(self) -> Self {
        Self {
            locomotion_mode: SteeringLocomotionMode::OmniDirectional,
            ..self
        }
    }

    /// Set the maximum force that can be applied to the agent.
    pub fn with_max_force(self, force: Vec3) -> Self {
        Self {
            max_force: force,
            ..self
        }
    }

    /// Set the maximum torque that can be applied to the agent.
    pub fn with_max_torque(self, torque: Vec3) -> Self {
        Self {
            max_torque: torque,
            ..self
        }
    }
}

/// Radius of the bounding sphere of an agent or obstacle. Used for the
/// alignment neighborhood (3x the radius is always "near") and for the
/// width of the avoidance collision cylinder. The default of 0.0 means
/// the size is ignored.
#[derive(Component, Debug, Default, Copy, Clone, PartialEq, Reflect, Deref)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[reflect(Component)]
pub struct BoundingRadius(pub f32);

/// Identifier shared by all members of a team.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TeamId(pub u32);

/// Team membership. Members of the same team form the default
/// neighborhood of [Align](crate::prelude::Align).
#[derive(Component, Debug, Copy, Clone, PartialEq, Eq, Reflect, Deref)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[reflect(Component)]
pub struct Team(pub TeamId);

impl Team {
    pub fn new(id: u32) -> Self {
        Self(TeamId(id))
    }

    pub fn id(&self) -> TeamId {
        self.0
    }
}
