pub use crate::{
    agent::{BoundingRadius, SteeringAgent, SteeringLocomotionMode, Team, TeamId},
    behaviors::{
        SteeringBehavior, SteeringContext,
        alignment::{Align, NeighborSource, alignment_steering},
        avoid::{Avoid, avoidance_steering, random_vector_in_plane},
    },
    control::{
        BehaviorType, SteeringForce, SteeringOutputs, SteeringRng, SteeringSettings,
        WeightedSteering,
    },
    error::{SteeringConfigError, SteeringResult},
    kinematic::{Capabilities, Kinematic, KinematicSnapshots, TeamRosters},
    neighbors::{NeighborhoodParams, is_neighbor},
    obstacles::{Obstacle, ObstacleScan, sort_obstacles_by_distance},
    plugin::{
        BehaviorSystemSet, DebugSteeringConfig, DebugSteeringFlags, DebugSteeringPlugin,
        DebugSteeringSystem, SteeringPlugin, SteeringSystemSet,
    },
};
