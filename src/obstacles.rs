use std::cmp::Ordering;

use bevy::prelude::*;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{agent::BoundingRadius, kinematic::KinematicSnapshots};

/// Marks an entity as something agents can avoid. Obstacles are
/// snapshotted every tick along with the agents, so an [Avoid](crate::prelude::Avoid)
/// behavior can refer to them by entity. Give it a [BoundingRadius] to
/// make it more than a point.
#[derive(Component, Debug, Default, Copy, Clone, Reflect)]
#[reflect(Component)]
#[require(BoundingRadius)]
pub struct Obstacle;

/// What obstacle avoidance does when it meets an obstacle whose center is
/// further than its `min_distance`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ObstacleScan {
    /// Stop scanning the list. Only correct when the obstacle list is
    /// sorted nearest first, see [sort_obstacles_by_distance].
    #[default]
    StopAtFirstDistant,
    /// Skip the obstacle and keep scanning.
    SkipDistant,
}

/// Sort `obstacles` nearest first, measured from the center of `agent` to
/// the center of each obstacle. Entities without a snapshot go last.
pub fn sort_obstacles_by_distance(
    agent: Entity,
    obstacles: &mut [Entity],
    snapshots: &KinematicSnapshots,
) {
    let Some(agent) = snapshots.get(&agent) else {
        return;
    };
    let distance = |entity: &Entity| {
        snapshots
            .get(entity)
            .map(|obstacle| agent.distance_squared(obstacle))
    };
    obstacles.sort_by(|a, b| match (distance(a), distance(b)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
