use bevy::prelude::*;
use bitflags::bitflags;

use crate::{
    behaviors::{
        alignment::Align,
        avoid::{Avoid, debug_avoidance},
        run,
    },
    control::{
        SteeringRng, SteeringSettings, combine_steering_forces, debug_steering_forces,
    },
    kinematic::{KinematicSnapshots, TeamRosters, snapshot_kinematics},
    movement::apply_steering_forces,
    neighbors::debug_neighborhoods,
};

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct BehaviorSystemSet;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct SteeringSystemSet;

/// Runs the steering pipeline once per fixed tick: snapshot every agent
/// and obstacle, evaluate the behaviors, combine their outputs into
/// [SteeringForce](crate::prelude::SteeringForce) and, unless turned off
/// in [SteeringSettings], apply it to the rigid bodies.
pub struct SteeringPlugin;

impl Plugin for SteeringPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SteeringSettings>()
            .init_resource::<SteeringRng>()
            .init_resource::<KinematicSnapshots>()
            .init_resource::<TeamRosters>()
            .register_type::<SteeringSettings>();

        let behavior_systems = (run::<Align>, run::<Avoid>).in_set(BehaviorSystemSet);
        let update_systems = (
            snapshot_kinematics,
            behavior_systems,
            combine_steering_forces,
            apply_steering_forces.run_if(|settings: Res<SteeringSettings>| settings.apply_forces),
        )
            .chain()
            .in_set(SteeringSystemSet);
        app.add_systems(FixedUpdate, update_systems);
    }
}

bitflags! {
    /// Which debug gizmos to draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugSteeringFlags: u32 {
        /// Alignment neighborhoods and the lines to accepted neighbors.
        const NEIGHBORHOODS = 1 << 0;
        /// The avoidance collision cylinder.
        const COLLISION_CYLINDER = 1 << 1;
        /// The combined steering force.
        const STEERING_FORCE = 1 << 2;
    }
}

#[derive(Resource, Debug, Clone)]
pub struct DebugSteeringConfig {
    pub flags: DebugSteeringFlags,
}

impl Default for DebugSteeringConfig {
    fn default() -> Self {
        Self {
            flags: DebugSteeringFlags::all(),
        }
    }
}

fn debug_enabled(flag: DebugSteeringFlags) -> impl Fn(Res<DebugSteeringConfig>) -> bool {
    move |config: Res<DebugSteeringConfig>| config.flags.contains(flag)
}

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct DebugSteeringSystem;

pub struct DebugSteeringPlugin;

impl Plugin for DebugSteeringPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugSteeringConfig>();
        let debug_systems = (
            debug_neighborhoods.run_if(debug_enabled(DebugSteeringFlags::NEIGHBORHOODS)),
            debug_avoidance.run_if(debug_enabled(DebugSteeringFlags::COLLISION_CYLINDER)),
            debug_steering_forces.run_if(debug_enabled(DebugSteeringFlags::STEERING_FORCE)),
        )
            .in_set(DebugSteeringSystem);
        app.add_systems(Update, debug_systems);
    }
}
