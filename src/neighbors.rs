use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;

use crate::{
    behaviors::alignment::{Align, NEAR_RADIUS_FACTOR},
    error::{SteeringConfigError, SteeringResult, non_negative},
    kinematic::{Kinematic, KinematicSnapshots, TeamRosters},
};

/// Decide whether `other` is in the neighborhood of `agent`.
///
/// Anything closer than `min_distance` is a neighbor no matter where it
/// is, anything further than `max_distance` never is. In between, `other`
/// must lie strictly within `max_angle` radians of the agent's forward
/// axis. An agent without velocity has no heading to judge by, so it
/// excludes everything in that band. An entity is never its own neighbor.
pub fn is_neighbor(
    agent: &Kinematic,
    other: &Kinematic,
    min_distance: f32,
    max_distance: f32,
    max_angle: f32,
) -> bool {
    if agent.entity() == other.entity() {
        return false;
    }
    let distance_squared = agent.distance_squared(other);
    if distance_squared < min_distance * min_distance {
        return true;
    }
    if distance_squared > max_distance * max_distance {
        return false;
    }
    if !agent.has_velocity() {
        return false;
    }
    // A coincident entity has no direction, so it can't be "in front".
    let offset = agent.offset(other);
    if offset.try_normalize().is_none() {
        return false;
    }
    agent.forwardness(offset) > max_angle.cos()
}

/// Validated neighborhood thresholds. Immutable once built.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NeighborhoodParams {
    min_distance: f32,
    max_distance: f32,
    max_angle: f32,
}

impl Default for NeighborhoodParams {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            max_angle: FRAC_PI_2,
        }
    }
}

impl NeighborhoodParams {
    pub fn new(min_distance: f32, max_distance: f32, max_angle: f32) -> SteeringResult<Self> {
        if !non_negative(min_distance) {
            return Err(SteeringConfigError::NegativeMinDistance(min_distance));
        }
        if !non_negative(max_distance) {
            return Err(SteeringConfigError::NegativeMaxDistance(max_distance));
        }
        if max_distance < min_distance {
            return Err(SteeringConfigError::InvertedDistanceRange {
                min: min_distance,
                max: max_distance,
            });
        }
        Ok(Self {
            min_distance,
            max_distance,
            max_angle,
        })
    }

    /// Thresholds taken as given. An inverted range keeps the plain
    /// classifier result: everything inside `min_distance` and nothing
    /// else.
    pub(crate) fn unchecked(min_distance: f32, max_distance: f32, max_angle: f32) -> Self {
        Self {
            min_distance,
            max_distance,
            max_angle,
        }
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn max_angle(&self) -> f32 {
        self.max_angle
    }

    pub fn contains(&self, agent: &Kinematic, other: &Kinematic) -> bool {
        is_neighbor(
            agent,
            other,
            self.min_distance,
            self.max_distance,
            self.max_angle,
        )
    }
}

/// Draw gizmos in the scene to visualize the alignment neighborhoods.
pub(crate) fn debug_neighborhoods(
    mut gizmos: Gizmos,
    agent_query: Query<(Entity, &Align)>,
    snapshots: Res<KinematicSnapshots>,
    rosters: Res<TeamRosters>,
) {
    const NEAR_COLOR: Color = Color::srgba(0.0, 1.0, 1.0, 0.3);
    const FAR_COLOR: Color = Color::srgba(0.0, 0.5, 1.0, 0.15);
    const LINE_COLOR: Color = Color::srgb(1.0, 0.0, 0.0);

    for (entity, align) in agent_query.iter() {
        let Some(agent) = snapshots.get(&entity) else {
            continue;
        };
        let near_radius = agent.radius() * NEAR_RADIUS_FACTOR;
        gizmos.sphere(agent.position(), near_radius, NEAR_COLOR);
        if align.max_distance().is_finite() {
            gizmos.sphere(agent.position(), align.max_distance(), FAR_COLOR);
        }
        let neighborhood = align.neighborhood(agent);
        for neighbor in align.neighbors(&snapshots, &rosters) {
            if neighborhood.contains(agent, neighbor) {
                gizmos.line(agent.position(), neighbor.position(), LINE_COLOR);
            }
        }
    }
}
