pub(crate) mod alignment;
pub(crate) mod avoid;

use bevy::prelude::*;
use rand::RngCore;

use crate::{
    control::{BehaviorType, SteeringOutputs, SteeringRng, SteeringSettings, WeightedSteering},
    kinematic::{Kinematic, KinematicSnapshots, TeamRosters},
};

/// Everything a behavior may read while computing its steering for one
/// agent. The snapshots are lent for a single evaluation and must not be
/// kept past it.
pub struct SteeringContext<'a> {
    /// Snapshots of every agent and obstacle this tick.
    pub snapshots: &'a KinematicSnapshots,
    /// Members of each team this tick.
    pub rosters: &'a TeamRosters,
    /// The fixed per-step time constant, in seconds.
    pub frame_time: f32,
    /// The duration of the current tick, in seconds. Neither built-in
    /// behavior reads it; it is there for behaviors that look one tick
    /// ahead with [Kinematic::predicted_position].
    pub delta: f32,
    /// Source of randomness for tie-breaking.
    pub rng: &'a mut dyn RngCore,
}

/// A steering behavior turns an agent's state into a raw steering vector.
/// The raw vector is scaled by the behavior's strength before it is
/// summed with the other behaviors of the same agent.
pub trait SteeringBehavior {
    /// The slot this behavior fills in [SteeringOutputs].
    const TYPE: BehaviorType;

    /// Weight applied to the raw steering vector.
    fn strength(&self) -> f32;

    /// Disabled behaviors are not evaluated at all.
    fn is_enabled(&self) -> bool;

    /// Compute the unweighted steering vector for `agent`.
    fn raw_steering(&self, agent: &Kinematic, cx: &mut SteeringContext) -> Vec3;

    /// The raw steering vector paired with the strength, or `None` if the
    /// behavior is disabled, in which case [SteeringBehavior::raw_steering]
    /// is never called.
    fn output(&self, agent: &Kinematic, cx: &mut SteeringContext) -> Option<WeightedSteering> {
        if !self.is_enabled() {
            return None;
        }
        Some(WeightedSteering {
            raw: self.raw_steering(agent, cx),
            strength: self.strength(),
        })
    }

    /// The weighted steering vector, or `None` if the behavior is
    /// disabled.
    fn steering(&self, agent: &Kinematic, cx: &mut SteeringContext) -> Option<Vec3> {
        self.output(agent, cx).as_ref().map(WeightedSteering::weighted)
    }
}

/// Evaluate behavior `B` for every agent that has it, and record the
/// result in the agent's [SteeringOutputs].
pub(crate) fn run<B: SteeringBehavior + Component>(
    mut query: Query<(Entity, &B, &mut SteeringOutputs)>,
    snapshots: Res<KinematicSnapshots>,
    rosters: Res<TeamRosters>,
    settings: Res<SteeringSettings>,
    fixed_time: Res<Time<Fixed>>,
    time: Res<Time>,
    mut rng: ResMut<SteeringRng>,
) {
    let frame_time = settings.frame_time(&fixed_time);
    let delta = time.delta_secs();

    for (entity, behavior, mut outputs) in query.iter_mut() {
        let Some(agent) = snapshots.get(&entity) else {
            debug!("{} skipped for {entity}: no kinematic snapshot", B::TYPE);
            outputs.clear(B::TYPE);
            continue;
        };
        let mut cx = SteeringContext {
            snapshots: &snapshots,
            rosters: &rosters,
            frame_time,
            delta,
            rng: &mut rng.0,
        };
        match behavior.output(agent, &mut cx) {
            None => outputs.clear(B::TYPE),
            Some(output) if !output.raw.is_finite() => {
                warn!("{} produced a non-finite steering vector for {entity}", B::TYPE);
                outputs.clear(B::TYPE);
            }
            Some(output) => outputs.set(B::TYPE, output.raw, output.strength),
        }
    }
}
