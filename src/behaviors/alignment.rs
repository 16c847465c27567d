use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;

use crate::{
    agent::{Team, TeamId},
    behaviors::{SteeringBehavior, SteeringContext},
    control::BehaviorType,
    error::{SteeringConfigError, SteeringResult, non_negative},
    kinematic::{Kinematic, KinematicSnapshots, TeamRosters},
    neighbors::NeighborhoodParams,
};

/// Neighbors closer than this many bounding radii always count,
/// whichever way the agent is facing.
pub(crate) const NEAR_RADIUS_FACTOR: f32 = 3.0;

/// Where an [Align] behavior finds its neighbors.
#[derive(Debug, Clone, PartialEq, Reflect)]
pub enum NeighborSource {
    /// Every member of the team.
    Team(TeamId),
    /// An explicit list of entities, maintained by the caller.
    Entities(Vec<Entity>),
}

/// Align behavior steers the agent to head the same way as its neighbors.
///
/// Every tick it averages the forward vectors of the neighbors that pass
/// the neighborhood test and returns the offset from the agent's position
/// to that average. The neighbors are the agent's team by default, or an
/// explicit list set with [Align::from_neighbors].
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
pub struct Align {
    neighbors: NeighborSource,
    /// Neighbors further than this are ignored.
    max_distance: f32,
    /// Neighbors between the near radius and `max_distance` must be
    /// within this angle (radians) of the agent's forward axis.
    max_angle: f32,
    strength: f32,
    enabled: bool,
}

impl Align {
    fn new(neighbors: NeighborSource) -> Self {
        Self {
            neighbors,
            max_distance: f32::INFINITY,
            max_angle: FRAC_PI_2,
            strength: 1.0,
            enabled: true,
        }
    }

    /// Align with the members of `team`. Fails if the agent has no team,
    /// so pass the agent's own [Team] component (if any).
    pub fn from_team(team: Option<&Team>) -> SteeringResult<Self> {
        let team = team.ok_or(SteeringConfigError::MissingTeam)?;
        Ok(Self::new(NeighborSource::Team(team.id())))
    }

    /// Align with an explicit list of entities.
    pub fn from_neighbors(neighbors: Vec<Entity>) -> Self {
        Self::new(NeighborSource::Entities(neighbors))
    }

    /// Set the maximum distance for a neighbor to be considered. Fails
    /// if `max_distance` is negative.
    pub fn with_max_distance(mut self, max_distance: f32) -> SteeringResult<Self> {
        self.set_max_distance(max_distance)?;
        Ok(self)
    }

    /// Set the maximum angle (radians) from the forward axis.
    pub fn with_max_angle(mut self, max_angle: f32) -> Self {
        self.max_angle = max_angle;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn set_max_distance(&mut self, max_distance: f32) -> SteeringResult<()> {
        if !non_negative(max_distance) {
            return Err(SteeringConfigError::NegativeMaxDistance(max_distance));
        }
        self.max_distance = max_distance;
        Ok(())
    }

    pub fn set_max_angle(&mut self, max_angle: f32) {
        self.max_angle = max_angle;
    }

    pub fn set_neighbors(&mut self, neighbors: Vec<Entity>) {
        self.neighbors = NeighborSource::Entities(neighbors);
    }

    pub fn set_neighbors_from_team(&mut self, team: TeamId) {
        self.neighbors = NeighborSource::Team(team);
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

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn max_angle(&self) -> f32 {
        self.max_angle
    }

    pub fn neighbor_source(&self) -> &NeighborSource {
        &self.neighbors
    }

    /// The candidate neighbors for this tick, before the neighborhood test.
    pub(crate) fn neighbors<'a>(
        &'a self,
        snapshots: &'a KinematicSnapshots,
        rosters: &'a TeamRosters,
    ) -> impl Iterator<Item = &'a Kinematic> {
        let entities = match &self.neighbors {
            NeighborSource::Team(team) => {
                let members = rosters.members(*team);
                if members.is_empty() {
                    debug!("Team {team:?} has no members to align with");
                }
                members
            }
            NeighborSource::Entities(entities) => entities.as_slice(),
        };
        snapshots.resolve(entities)
    }

    /// The neighborhood thresholds for `agent` this tick: always near
    /// within 3x its radius, never beyond `max_distance`. When
    /// `max_distance` is below the near radius, the near radius alone
    /// decides.
    pub(crate) fn neighborhood(&self, agent: &Kinematic) -> NeighborhoodParams {
        let near = agent.radius() * NEAR_RADIUS_FACTOR;
        NeighborhoodParams::new(near, self.max_distance, self.max_angle).unwrap_or_else(|err| {
            debug!("Alignment neighborhood of {}: {err}", agent.entity());
            NeighborhoodParams::unchecked(near, self.max_distance, self.max_angle)
        })
    }
}

impl SteeringBehavior for Align {
    const TYPE: BehaviorType = BehaviorType::Alignment;

    fn strength(&self) -> f32 {
        self.strength
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn raw_steering(&self, agent: &Kinematic, cx: &mut SteeringContext) -> Vec3 {
        let neighborhood = self.neighborhood(agent);
        let neighbors = self
            .neighbors(cx.snapshots, cx.rosters)
            .filter(|neighbor| neighborhood.contains(agent, neighbor));
        alignment_steering(agent, neighbors)
    }
}

/// Average the forward vectors of `neighbors` and return the offset from
/// the agent's position to that average. Callers are expected to have
/// filtered `neighbors` already. With no neighbors this is zero.
pub fn alignment_steering<'a>(
    agent: &Kinematic,
    neighbors: impl IntoIterator<Item = &'a Kinematic>,
) -> Vec3 {
    let mut heading_sum = Vec3::ZERO;
    let mut count = 0;
    for neighbor in neighbors {
        heading_sum += neighbor.forward();
        count += 1;
    }
    if count == 0 {
        return Vec3::ZERO;
    }
    agent.offset_to(heading_sum / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::{BoundingRadius, SteeringAgent},
        behaviors::run,
        control::{SteeringOutputs, SteeringRng, SteeringSettings},
        kinematic::snapshot_kinematics,
    };
    use avian3d::prelude::LinearVelocity;
    use bevy::ecs::system::RunSystemOnce;

    fn context<'a>(
        snapshots: &'a KinematicSnapshots,
        rosters: &'a TeamRosters,
        rng: &'a mut SteeringRng,
    ) -> SteeringContext<'a> {
        SteeringContext {
            snapshots,
            rosters,
            frame_time: 1.0 / 64.0,
            delta: 1.0 / 64.0,
            rng: &mut rng.0,
        }
    }

    #[test]
    fn test_from_team_requires_team() {
        assert_eq!(
            Align::from_team(None),
            Err(SteeringConfigError::MissingTeam)
        );
        let align = Align::from_team(Some(&Team::new(3))).unwrap();
        assert_eq!(align.neighbor_source(), &NeighborSource::Team(TeamId(3)));
        assert_eq!(align.max_distance(), f32::INFINITY);
        assert_eq!(align.max_angle(), FRAC_PI_2);
    }

    #[test]
    fn test_negative_max_distance_is_rejected() {
        let result = Align::from_neighbors(vec![]).with_max_distance(-1.0);
        assert_eq!(result, Err(SteeringConfigError::NegativeMaxDistance(-1.0)));

        let mut align = Align::from_neighbors(vec![]);
        assert!(align.set_max_distance(-0.5).is_err());
        assert_eq!(align.max_distance(), f32::INFINITY);
        assert!(align.set_max_distance(4.0).is_ok());
        assert_eq!(align.max_distance(), 4.0);
    }

    #[test]
    fn test_no_neighbors_is_zero() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::new(4.0, 1.0, 2.0));
        assert_eq!(alignment_steering(&agent, Vec::new()), Vec3::ZERO);
    }

    #[test]
    fn test_single_neighbor_target_offset() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO).with_velocity(Vec3::Z);
        let neighbor = Kinematic::new(world.spawn_empty().id(), Vec3::new(1.0, 0.0, 0.0));
        assert!(neighbor.forward().abs_diff_eq(Vec3::Z, 0.0001));
        let steering = alignment_steering(&agent, [&neighbor]);
        assert!(steering.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 0.0001));
    }

    #[test]
    fn test_offset_is_relative_to_agent_position() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::new(2.0, 0.0, 0.0));
        let a = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO).facing(Vec3::X);
        let b = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO).facing(Vec3::Z);
        // average heading (0.5, 0, 0.5) minus the agent's position
        let steering = alignment_steering(&agent, [&a, &b]);
        assert!(steering.abs_diff_eq(Vec3::new(-1.5, 0.0, 0.5), 0.0001));
    }

    #[test]
    fn test_raw_steering_filters_neighborhood() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO)
            .with_velocity(Vec3::Z)
            .with_radius(1.0);
        // inside 3x radius, behind the agent: always counts
        let near = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, -2.0))
            .facing(Vec3::X);
        // ahead and in range
        let ahead = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, 6.0))
            .facing(Vec3::X);
        // behind and outside the near radius
        let behind = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, -6.0))
            .facing(Vec3::NEG_X);
        // too far away
        let far = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, 50.0))
            .facing(Vec3::NEG_X);

        let snapshots: KinematicSnapshots = [agent, near, ahead, behind, far].into_iter().collect();
        let rosters = TeamRosters::default();
        let mut rng = SteeringRng::seeded(0);
        let align = Align::from_neighbors(vec![
            agent.entity(),
            near.entity(),
            ahead.entity(),
            behind.entity(),
            far.entity(),
        ])
        .with_max_distance(10.0)
        .unwrap();

        let mut cx = context(&snapshots, &rosters, &mut rng);
        let steering = align.raw_steering(&agent, &mut cx);
        assert!(steering.abs_diff_eq(Vec3::X, 0.0001), "got {steering}");
    }

    #[test]
    fn test_max_distance_below_near_radius() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO)
            .with_velocity(Vec3::Z)
            .with_radius(2.0);
        // behind the agent, inside the near radius of 6 but beyond max_distance
        let near = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, -3.0))
            .facing(Vec3::X);
        let snapshots: KinematicSnapshots = [agent, near].into_iter().collect();
        let rosters = TeamRosters::default();
        let mut rng = SteeringRng::seeded(0);

        let align = Align::from_neighbors(vec![near.entity()])
            .with_max_distance(1.0)
            .unwrap();
        let neighborhood = align.neighborhood(&agent);
        assert_eq!(neighborhood.min_distance(), 6.0);
        assert_eq!(neighborhood.max_distance(), 1.0);

        let mut cx = context(&snapshots, &rosters, &mut rng);
        let steering = align.raw_steering(&agent, &mut cx);
        assert!(steering.abs_diff_eq(Vec3::X, 0.0001), "got {steering}");
    }

    #[test]
    fn test_neighborhood_uses_near_radius() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO).with_radius(1.5);
        let align = Align::from_neighbors(vec![])
            .with_max_distance(20.0)
            .unwrap()
            .with_max_angle(0.5);
        assert_eq!(
            align.neighborhood(&agent),
            NeighborhoodParams::new(4.5, 20.0, 0.5).unwrap()
        );
    }

    #[test]
    fn test_team_roster_and_swapping_neighbors() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO)
            .with_velocity(Vec3::Z)
            .with_team(TeamId(1));
        let mate = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, 3.0))
            .with_team(TeamId(1))
            .facing(Vec3::X);
        let other = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, 3.0))
            .facing(Vec3::NEG_X);

        let snapshots: KinematicSnapshots = [agent, mate, other].into_iter().collect();
        let mut rosters = TeamRosters::default();
        rosters.add_member(TeamId(1), agent.entity());
        rosters.add_member(TeamId(1), mate.entity());
        let mut rng = SteeringRng::seeded(0);

        let mut align = Align::from_team(Some(&Team::new(1))).unwrap();
        let mut cx = context(&snapshots, &rosters, &mut rng);
        assert!(align.raw_steering(&agent, &mut cx).abs_diff_eq(Vec3::X, 0.0001));

        align.set_neighbors(vec![other.entity()]);
        assert!(
            align
                .raw_steering(&agent, &mut cx)
                .abs_diff_eq(Vec3::NEG_X, 0.0001)
        );

        // an empty team gives no correction
        align.set_neighbors_from_team(TeamId(2));
        assert_eq!(align.raw_steering(&agent, &mut cx), Vec3::ZERO);
    }

    #[test]
    fn test_disabled_is_not_evaluated() {
        let mut world = World::new();
        let agent = Kinematic::new(world.spawn_empty().id(), Vec3::ZERO).with_radius(1.0);
        let neighbor = Kinematic::new(world.spawn_empty().id(), Vec3::new(0.0, 0.0, -1.0));
        let snapshots: KinematicSnapshots = [agent, neighbor].into_iter().collect();
        let rosters = TeamRosters::default();
        let mut rng = SteeringRng::seeded(0);
        let mut cx = context(&snapshots, &rosters, &mut rng);

        let mut align = Align::from_neighbors(vec![neighbor.entity()]).with_strength(2.0);
        let weighted = align.steering(&agent, &mut cx);
        assert!(weighted.is_some_and(|v| v.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 0.0001)));

        align.set_enabled(false);
        assert_eq!(align.steering(&agent, &mut cx), None);
    }

    #[test]
    fn test_run_alignment_system() {
        let mut world = World::new();
        world.init_resource::<SteeringSettings>();
        world.init_resource::<KinematicSnapshots>();
        world.init_resource::<TeamRosters>();
        world.insert_resource(SteeringRng::seeded(7));
        world.insert_resource(Time::<Fixed>::default());
        world.insert_resource(Time::<()>::default());

        let leader = world
            .spawn((
                SteeringAgent::default(),
                Team::new(1),
                GlobalTransform::from(
                    Transform::from_xyz(0.0, 0.0, 2.0).looking_to(Vec3::NEG_X, Vec3::Y),
                ),
                LinearVelocity(Vec3::ZERO),
            ))
            .id();
        let follower = world
            .spawn((
                SteeringAgent::default(),
                Team::new(1),
                BoundingRadius(1.0),
                GlobalTransform::default(),
                LinearVelocity(Vec3::Z),
            ))
            .id();
        let team = world.get::<Team>(follower).copied();
        let align = Align::from_team(team.as_ref()).unwrap().with_strength(0.5);
        world.entity_mut(follower).insert(align);
        // leader has alignment switched off
        let mut disabled = Align::from_team(Some(&Team::new(1))).unwrap();
        disabled.set_enabled(false);
        world.entity_mut(leader).insert(disabled);

        world
            .run_system_once(snapshot_kinematics)
            .expect("Failed to run snapshot_kinematics system");
        world
            .run_system_once(run::<Align>)
            .expect("Failed to run alignment system");

        // looking_to(-X) rotates +Z onto +X
        let outputs = world.get::<SteeringOutputs>(follower).unwrap();
        let output = outputs.get(BehaviorType::Alignment).unwrap();
        assert!(output.raw.abs_diff_eq(Vec3::X, 0.0001), "got {}", output.raw);
        assert_eq!(output.strength, 0.5);

        let outputs = world.get::<SteeringOutputs>(leader).unwrap();
        assert_eq!(outputs.get(BehaviorType::Alignment), None);
    }
}
