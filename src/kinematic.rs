use avian3d::prelude::LinearVelocity;
use bevy::{ecs::query::QueryData, platform::collections::HashMap, prelude::*};
use bitflags::bitflags;

use crate::{
    agent::{BoundingRadius, SteeringAgent, Team, TeamId},
    control::SteeringSettings,
    obstacles::Obstacle,
};

bitflags! {
    /// Optional capabilities of a kinematic entity. Algorithms ask for
    /// a capability through a predicate instead of inspecting what kind
    /// of entity they were given.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u8 {
        /// The entity has a known linear velocity.
        const VELOCITY = 1 << 0;
        /// The entity belongs to a team.
        const TEAM = 1 << 1;
        /// The entity has a non-zero bounding radius.
        const BOUNDING_RADIUS = 1 << 2;
    }
}

/// A read-only snapshot of the kinematic state of an agent or obstacle,
/// taken once per tick. Behaviors only ever see these snapshots, never
/// the live components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematic {
    entity: Entity,
    position: Vec3,
    velocity: Option<Vec3>,
    orientation: Quat,
    forward_axis: Vec3,
    radius: f32,
    team: Option<TeamId>,
}

impl Kinematic {
    /// A snapshot at `position` with identity orientation, no velocity,
    /// no team and a radius of 0.0.
    pub fn new(entity: Entity, position: Vec3) -> Self {
        Self {
            entity,
            position,
            velocity: None,
            orientation: Quat::IDENTITY,
            forward_axis: Vec3::Z,
            radius: 0.0,
            team: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    /// Rotate the snapshot so that [Kinematic::forward] points along
    /// `direction`. A zero direction leaves the orientation untouched.
    pub fn facing(mut self, direction: Vec3) -> Self {
        if let (Some(axis), Some(direction)) =
            (self.forward_axis.try_normalize(), direction.try_normalize())
        {
            self.orientation = Quat::from_rotation_arc(axis, direction);
        }
        self
    }

    /// Negative radii are stored as 0.0.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius.max(0.0);
        self
    }

    pub fn with_team(mut self, team: TeamId) -> Self {
        self.team = Some(team);
        self
    }

    /// The local axis that is considered "forward". Defaults to +Z.
    pub fn with_forward_axis(mut self, axis: Vec3) -> Self {
        self.forward_axis = axis;
        self
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Option<Vec3> {
        self.velocity
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn team(&self) -> Option<TeamId> {
        self.team
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::empty();
        capabilities.set(Capabilities::VELOCITY, self.velocity.is_some());
        capabilities.set(Capabilities::TEAM, self.team.is_some());
        capabilities.set(Capabilities::BOUNDING_RADIUS, self.radius > 0.0);
        capabilities
    }

    pub fn has_velocity(&self) -> bool {
        self.capabilities().contains(Capabilities::VELOCITY)
    }

    pub fn has_team(&self) -> bool {
        self.capabilities().contains(Capabilities::TEAM)
    }

    pub fn has_bounding_radius(&self) -> bool {
        self.capabilities().contains(Capabilities::BOUNDING_RADIUS)
    }

    /// Unit vector the entity is facing. Always derived from the
    /// orientation so the two can never disagree.
    pub fn forward(&self) -> Vec3 {
        (self.orientation * self.forward_axis).normalize_or(Vec3::Z)
    }

    /// Vector from this entity to `other`.
    pub fn offset(&self, other: &Kinematic) -> Vec3 {
        other.position - self.position
    }

    /// Vector from this entity to a world-space point.
    pub fn offset_to(&self, point: Vec3) -> Vec3 {
        point - self.position
    }

    pub fn distance(&self, other: &Kinematic) -> f32 {
        self.offset(other).length()
    }

    pub fn distance_squared(&self, other: &Kinematic) -> f32 {
        self.offset(other).length_squared()
    }

    /// Cosine of the angle between the forward axis and `direction`:
    /// 1.0 is dead ahead, 0.0 to the side and -1.0 straight back.
    /// A zero-length direction has no angle and yields 0.0.
    pub fn forwardness(&self, direction: Vec3) -> f32 {
        let Some(direction) = direction.try_normalize() else {
            return 0.0;
        };
        self.forward().dot(direction).clamp(-1.0, 1.0)
    }

    /// [Kinematic::forwardness] of the direction towards `other`.
    pub fn forwardness_to(&self, other: &Kinematic) -> f32 {
        self.forwardness(self.offset(other))
    }

    /// Where the entity will be after `delta` seconds at its current
    /// velocity. Entities without velocity stay where they are.
    pub fn predicted_position(&self, delta: f32) -> Vec3 {
        self.position + self.velocity.unwrap_or(Vec3::ZERO) * delta
    }

    /// Both entities have a team and it is the same one.
    pub fn is_same_team(&self, other: &Kinematic) -> bool {
        matches!((self.team, other.team), (Some(a), Some(b)) if a == b)
    }
}

/// Snapshots of every agent and obstacle for the current tick.
#[derive(Resource, Debug, Default, Deref)]
pub struct KinematicSnapshots(HashMap<Entity, Kinematic>);

impl KinematicSnapshots {
    pub fn insert(&mut self, kinematic: Kinematic) {
        self.0.insert(kinematic.entity(), kinematic);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Look up the snapshots of `entities`, in order. Entities without a
    /// snapshot (e.g. despawned since the list was built) are skipped.
    pub fn resolve<'a>(&'a self, entities: &'a [Entity]) -> impl Iterator<Item = &'a Kinematic> {
        entities.iter().filter_map(|entity| {
            let found = self.0.get(entity);
            if found.is_none() {
                debug!("No kinematic snapshot for {entity}, skipping");
            }
            found
        })
    }
}

impl FromIterator<Kinematic> for KinematicSnapshots {
    fn from_iter<T: IntoIterator<Item = Kinematic>>(iter: T) -> Self {
        Self(iter.into_iter().map(|k| (k.entity(), k)).collect())
    }
}

/// Members of each team, in ascending entity order.
#[derive(Resource, Debug, Default)]
pub struct TeamRosters(HashMap<TeamId, Vec<Entity>>);

impl TeamRosters {
    pub fn members(&self, team: TeamId) -> &[Entity] {
        self.0.get(&team).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn add_member(&mut self, team: TeamId, entity: Entity) {
        let members = self.0.entry(team).or_default();
        if let Err(index) = members.binary_search(&entity) {
            members.insert(index, entity);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(QueryData)]
pub(crate) struct SnapshotQuery {
    entity: Entity,
    transform: &'static GlobalTransform,
    velocity: Option<&'static LinearVelocity>,
    radius: Option<&'static BoundingRadius>,
    team: Option<&'static Team>,
}

/// Rebuild [KinematicSnapshots] and [TeamRosters] from every agent and
/// obstacle in the world.
pub(crate) fn snapshot_kinematics(
    query: Query<SnapshotQuery, Or<(With<SteeringAgent>, With<Obstacle>)>>,
    settings: Res<SteeringSettings>,
    mut snapshots: ResMut<KinematicSnapshots>,
    mut rosters: ResMut<TeamRosters>,
) {
    snapshots.clear();
    rosters.clear();
    for item in query.iter() {
        let mut kinematic = Kinematic::new(item.entity, item.transform.translation())
            .with_orientation(item.transform.rotation())
            .with_forward_axis(settings.forward_axis)
            .with_radius(item.radius.map_or(0.0, |radius| radius.0));
        if let Some(velocity) = item.velocity {
            kinematic = kinematic.with_velocity(velocity.0);
        }
        if let Some(team) = item.team {
            kinematic = kinematic.with_team(team.id());
            rosters.add_member(team.id(), item.entity);
        }
        snapshots.insert(kinematic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    fn entities(world: &mut World, n: usize) -> Vec<Entity> {
        (0..n).map(|_| world.spawn_empty().id()).collect()
    }

    #[test]
    fn test_forward_is_derived_from_orientation() {
        let mut world = World::new();
        let e = world.spawn_empty().id();
        let k = Kinematic::new(e, Vec3::ZERO);
        assert!(k.forward().abs_diff_eq(Vec3::Z, 0.0001));

        let k = k.with_orientation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        assert!(k.forward().abs_diff_eq(Vec3::X, 0.0001));

        let k = k.facing(Vec3::new(0.0, 0.0, -3.0));
        assert!(k.forward().abs_diff_eq(Vec3::NEG_Z, 0.0001));
    }

    #[test]
    fn test_forwardness() {
        let mut world = World::new();
        let ids = entities(&mut world, 2);
        let agent = Kinematic::new(ids[0], Vec3::ZERO);
        let test_cases = [
            (Vec3::new(0.0, 0.0, 5.0), 1.0),
            (Vec3::new(5.0, 0.0, 0.0), 0.0),
            (Vec3::new(0.0, 0.0, -5.0), -1.0),
            (Vec3::ZERO, 0.0),
        ];
        for (input, expect) in test_cases {
            let output = agent.forwardness(input);
            assert!(
                (output - expect).abs() < 0.0001,
                "Failed for input: {input}, got {output}"
            );
        }

        let other = Kinematic::new(ids[1], Vec3::new(1.0, 0.0, 1.0));
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((agent.forwardness_to(&other) - expected).abs() < 0.0001);
    }

    #[test]
    fn test_capabilities() {
        let mut world = World::new();
        let e = world.spawn_empty().id();
        let bare = Kinematic::new(e, Vec3::ZERO);
        assert_eq!(bare.capabilities(), Capabilities::empty());
        assert!(!bare.has_velocity());

        let full = bare
            .with_velocity(Vec3::ZERO)
            .with_team(TeamId(1))
            .with_radius(0.5);
        assert!(full.has_velocity());
        assert!(full.has_team());
        assert!(full.has_bounding_radius());

        // negative radii are clamped rather than rejected
        assert_eq!(bare.with_radius(-2.0).radius(), 0.0);
    }

    #[test]
    fn test_team_and_prediction() {
        let mut world = World::new();
        let ids = entities(&mut world, 3);
        let a = Kinematic::new(ids[0], Vec3::ZERO)
            .with_team(TeamId(1))
            .with_velocity(Vec3::new(2.0, 0.0, 0.0));
        let b = Kinematic::new(ids[1], Vec3::ZERO).with_team(TeamId(1));
        let c = Kinematic::new(ids[2], Vec3::ZERO);
        assert!(a.is_same_team(&b));
        assert!(!a.is_same_team(&c));
        assert!(!c.is_same_team(&c));

        assert_eq!(a.predicted_position(0.5), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(c.predicted_position(0.5), Vec3::ZERO);
    }

    #[test]
    fn test_snapshot_kinematics() {
        let mut world = World::new();
        world.init_resource::<SteeringSettings>();
        world.init_resource::<KinematicSnapshots>();
        world.init_resource::<TeamRosters>();

        let moving = world
            .spawn((
                SteeringAgent::default(),
                GlobalTransform::from(Transform::from_xyz(1.0, 0.0, 0.0)),
                LinearVelocity(Vec3::new(0.0, 0.0, 3.0)),
                BoundingRadius(0.5),
                Team::new(7),
            ))
            .id();
        let resting = world
            .spawn((
                Obstacle,
                GlobalTransform::from(Transform::from_xyz(0.0, 0.0, 4.0)),
            ))
            .id();
        // neither an agent nor an obstacle
        let ignored = world
            .spawn(GlobalTransform::from(Transform::from_xyz(9.0, 0.0, 0.0)))
            .id();

        world
            .run_system_once(snapshot_kinematics)
            .expect("Failed to run snapshot_kinematics system");

        let snapshots = world.resource::<KinematicSnapshots>();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.get(&ignored).is_none());

        let moving_snapshot = snapshots.get(&moving).unwrap();
        assert_eq!(moving_snapshot.position(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(moving_snapshot.velocity(), Some(Vec3::new(0.0, 0.0, 3.0)));
        assert_eq!(moving_snapshot.radius(), 0.5);
        assert_eq!(moving_snapshot.team(), Some(TeamId(7)));

        let resting_snapshot = snapshots.get(&resting).unwrap();
        assert_eq!(resting_snapshot.velocity(), None);
        assert_eq!(resting_snapshot.radius(), 0.0);

        let rosters = world.resource::<TeamRosters>();
        assert_eq!(rosters.members(TeamId(7)), &[moving]);
        assert!(rosters.members(TeamId(8)).is_empty());
    }

    #[test]
    fn test_resolve_skips_missing() {
        let mut world = World::new();
        let ids = entities(&mut world, 3);
        let snapshots: KinematicSnapshots = [
            Kinematic::new(ids[0], Vec3::ZERO),
            Kinematic::new(ids[2], Vec3::ONE),
        ]
        .into_iter()
        .collect();
        let resolved: Vec<_> = snapshots.resolve(&ids).map(|k| k.entity()).collect();
        assert_eq!(resolved, vec![ids[0], ids[2]]);
    }
}
