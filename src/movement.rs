use avian3d::prelude::*;
use bevy::{ecs::query::QueryData, prelude::*};

use crate::{
    SMALL_THRESHOLD,
    agent::{SteeringAgent, SteeringLocomotionMode},
    control::{SteeringForce, SteeringSettings},
};

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct ApplySteeringQuery {
    agent: &'static SteeringAgent,
    forces: Forces,
    global_transform: &'static GlobalTransform,
    mass: &'static ComputedMass,
    moment: &'static ComputedAngularInertia,
    steering: &'static SteeringForce,
}

/// The physical force for a steering acceleration, clamped per axis.
fn linear_force(steering: Vec3, mass: f32, max_force: Vec3) -> Vec3 {
    (steering * mass).clamp(-max_force, max_force)
}

/// The heading a directional agent should turn towards: where it will be
/// going once the steering is applied. Falls back to `forward` when
/// that is undefined.
fn desired_heading(velocity: Vec3, steering: Vec3, forward: Vec3) -> Vec3 {
    let desired = velocity + steering;
    if desired.length_squared() > SMALL_THRESHOLD {
        desired.normalize()
    } else {
        forward
    }
}

/// Apply each agent's [SteeringForce] to its rigid body.
pub(crate) fn apply_steering_forces(
    mut query: Query<ApplySteeringQuery>,
    settings: Res<SteeringSettings>,
) {
    for mut item in query.iter_mut() {
        let steering = item.steering.0;
        let mass = item.mass.value();
        let max_force = item.agent.max_force;

        match item.agent.locomotion_mode {
            SteeringLocomotionMode::OmniDirectional => {
                item.forces
                    .apply_force(linear_force(steering, mass, max_force));
            }
            SteeringLocomotionMode::Directional => {
                let forward = (item.global_transform.rotation() * settings.forward_axis)
                    .normalize_or(Vec3::Z);
                let forward_force = linear_force(forward * steering.dot(forward), mass, max_force);

                let heading =
                    desired_heading(item.forces.linear_velocity(), steering, forward);
                let angle_error = forward.cross(heading);
                let moment_diag = item.moment.value().diagonal();
                let wn_angular = 6.0;
                let k_angular = wn_angular * wn_angular * moment_diag;
                let c_angular = 2.0 * wn_angular * moment_diag;
                let max_torque = item.agent.max_torque;
                let torque = k_angular * angle_error
                    - c_angular * item.forces.angular_velocity();

                item.forces.apply_force(forward_force);
                item.forces
                    .apply_torque(torque.clamp(-max_torque, max_torque));
            }
        }
    }
}
