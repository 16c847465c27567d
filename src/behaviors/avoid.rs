use avian3d::prelude::LinearVelocity;
use bevy::{ecs::query::QueryData, prelude::*};
use rand::Rng;

use crate::{
    behaviors::{SteeringBehavior, SteeringContext},
    control::{BehaviorType, SteeringSettings},
    error::{SteeringConfigError, SteeringResult, non_negative},
    kinematic::{Kinematic, KinematicSnapshots},
    obstacles::ObstacleScan,
};

/// Below this squared length the lateral offset of an obstacle counts as
/// zero, i.e. the obstacle is dead ahead.
const DEAD_AHEAD_THRESHOLD: f32 = 1e-10;

/// Avoid obstacles by keeping a cylinder of free space in front of the
/// agent. The cylinder lies along the agent's velocity, is as wide as the
/// agent's bounding sphere and reaches as far as the agent travels in
/// `min_time_to_collision` fixed steps. This is not a replacement for
/// navigation: it only pushes the agent sideways, away from the single
/// most urgent obstacle.
///
/// Obstacles need a [BoundingRadius](crate::prelude::BoundingRadius) for
/// their size to be taken into account.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
pub struct Avoid {
    obstacles: Vec<Entity>,
    min_time_to_collision: f32,
    /// Obstacles whose center is further than this are not considered.
    min_distance: f32,
    scan: ObstacleScan,
    strength: f32,
    enabled: bool,
}

impl Avoid {
    /// Avoid `obstacles`. Fails unless `min_time_to_collision` is positive.
    pub fn new(obstacles: Vec<Entity>, min_time_to_collision: f32) -> SteeringResult<Self> {
        if !(min_time_to_collision > 0.0) {
            return Err(SteeringConfigError::InvalidTimeToCollision(
                min_time_to_collision,
            ));
        }
        Ok(Self {
            obstacles,
            min_time_to_collision,
            min_distance: f32::INFINITY,
            scan: ObstacleScan::default(),
            strength: 1.0,
            enabled: true,
        })
    }

    /// Only consider obstacles whose center is at most `min_distance`
    /// away. Fails if `min_distance` is negative.
    pub fn with_min_distance(mut self, min_distance: f32) -> SteeringResult<Self> {
        if !non_negative(min_distance) {
            return Err(SteeringConfigError::NegativeMinDistance(min_distance));
        }
        self.min_distance = min_distance;
        Ok(self)
    }

    /// How to treat an obstacle beyond `min_distance`. See [ObstacleScan].
    pub fn with_scan(mut self, scan: ObstacleScan) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn set_obstacles(&mut self, obstacles: Vec<Entity>) {
        self.obstacles = obstacles;
    }

    /// Mutable access to the obstacle list, e.g. to sort it in place
    /// with [sort_obstacles_by_distance](crate::prelude::sort_obstacles_by_distance).
    pub fn obstacles_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.obstacles
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn obstacles(&self) -> &[Entity] {
        &self.obstacles
    }

    pub fn min_time_to_collision(&self) -> f32 {
        self.min_time_to_collision
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn scan(&self) -> ObstacleScan {
        self.scan
    }

    /// Length of the collision cylinder for `agent`.
    pub fn lookahead(&self, agent: &Kinematic, frame_time: f32) -> f32 {
        let speed = agent.velocity().map_or(0.0, Vec3::length);
        speed * frame_time * self.min_time_to_collision
    }
}

impl SteeringBehavior for Avoid {
    const TYPE: BehaviorType = BehaviorType::ObstacleAvoidance;

    fn strength(&self) -> f32 {
        self.strength
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn raw_steering(&self, agent: &Kinematic, cx: &mut SteeringContext) -> Vec3 {
        let obstacles = cx.snapshots.resolve(&self.obstacles);
        avoidance_steering(self, agent, obstacles, cx.frame_time, &mut *cx.rng)
    }
}

/// The steering force that pushes `agent` away from the most threatening
/// of `obstacles`, or zero if nothing is in the way.
///
/// An obstacle is a threat when it is in front of the agent and its
/// surface lies within the collision cylinder. The force points away from
/// the obstacle's lateral offset and its length is how deep the obstacle
/// reaches into the cylinder, from 0.0 (grazing) to 1.0 (dead ahead).
/// When the obstacle is exactly dead ahead, the direction is a random
/// one perpendicular to the velocity, drawn from `rng`.
pub fn avoidance_steering<'a, R: Rng + ?Sized>(
    avoid: &Avoid,
    agent: &Kinematic,
    obstacles: impl IntoIterator<Item = &'a Kinematic>,
    frame_time: f32,
    rng: &mut R,
) -> Vec3 {
    // no motion, no cylinder to project onto
    let Some(heading) = agent.velocity().and_then(Vec3::try_normalize) else {
        return Vec3::ZERO;
    };
    let radius = agent.radius();
    let lookahead = avoid.lookahead(agent, frame_time);
    let admission = lookahead * lookahead + radius * radius;

    let mut strongest = Vec3::ZERO;
    for obstacle in obstacles {
        if obstacle.entity() == agent.entity() {
            continue;
        }
        let center_distance = agent.distance(obstacle);
        if center_distance > avoid.min_distance {
            match avoid.scan {
                ObstacleScan::StopAtFirstDistant => break,
                ObstacleScan::SkipDistant => continue,
            }
        }

        let surface_distance = (center_distance - obstacle.radius()).max(0.0);
        let distance = (surface_distance - radius).max(0.0);
        if agent.forwardness_to(obstacle) <= 0.0 || distance * distance >= admission {
            continue;
        }

        // offset to the obstacle surface, split into the part along the
        // heading and the part across it
        let surface_offset = agent.offset(obstacle).normalize_or_zero() * surface_distance;
        let projection = heading * heading.dot(surface_offset);
        let correction = projection - surface_offset;
        let lateral = correction.length();
        if lateral >= radius {
            continue;
        }

        let direction = if correction.length_squared() > DEAD_AHEAD_THRESHOLD {
            correction / lateral
        } else {
            random_vector_in_plane(heading, agent.position(), &mut *rng)
                .try_normalize()
                .unwrap_or_else(|| heading.any_orthonormal_vector())
        };
        let force = direction * (radius - lateral) / radius;
        if force.length_squared() > strongest.length_squared() {
            strongest = force;
        }
    }
    strongest
}

/// A random vector lying in the plane through `point` with normal
/// `normal`. The plane equation is solved for the first axis (z, x, then
/// y) with a non-zero normal component, and the other two coordinates are
/// drawn uniformly within 1.0 of `point`. A zero normal defines no plane,
/// so the result is then a random offset in all three axes.
pub fn random_vector_in_plane<R: Rng + ?Sized>(normal: Vec3, point: Vec3, rng: &mut R) -> Vec3 {
    let Vec3 { x: a, y: b, z: c } = normal;
    let d = -normal.dot(point);
    let mut around = |value: f32| value + rng.random_range(-1.0f32..1.0);

    let random_point = if c != 0.0 {
        let x = around(point.x);
        let y = around(point.y);
        Vec3::new(x, y, -(a * x + b * y + d) / c)
    } else if a != 0.0 {
        let y = around(point.y);
        let z = around(point.z);
        Vec3::new(-(b * y + c * z + d) / a, y, z)
    } else if b != 0.0 {
        let x = around(point.x);
        let z = around(point.z);
        Vec3::new(x, -(a * x + c * z + d) / b, z)
    } else {
        Vec3::new(around(point.x), around(point.y), around(point.z))
    };
    random_point - point
}

#[derive(QueryData)]
pub(crate) struct DebugAvoidanceQuery {
    entity: Entity,
    avoid: &'static Avoid,
    velocity: &'static LinearVelocity,
}

/// Draw the collision cylinder of each avoiding agent as a line along its
/// velocity, with a circle marking its width at the far end.
pub(crate) fn debug_avoidance(
    mut gizmos: Gizmos,
    query: Query<DebugAvoidanceQuery>,
    snapshots: Res<KinematicSnapshots>,
    settings: Res<SteeringSettings>,
    fixed_time: Res<Time<Fixed>>,
) {
    const CYLINDER_COLOR: Color = Color::srgb(0.933, 0.0, 1.0);

    let frame_time = settings.frame_time(&fixed_time);
    for item in query.iter() {
        let Some(agent) = snapshots.get(&item.entity) else {
            continue;
        };
        let Ok(heading) = Dir3::new(item.velocity.0) else {
            continue;
        };
        let start = agent.position();
        let end = start + heading * item.avoid.lookahead(agent, frame_time);
        gizmos.line(start, end, CYLINDER_COLOR);
        let rotation = Quat::from_rotation_arc(Vec3::Z, *heading);
        gizmos.circle(Isometry3d::new(end, rotation), agent.radius(), CYLINDER_COLOR);
    }
}
