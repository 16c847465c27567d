use avian3d::prelude::*;
use bevy::prelude::*;
use bevy_steering_forces::prelude::*;

const NUM_BOIDS: usize = 24;
const NUM_ROCKS: usize = 8;
const ZONE_SIZE: f32 = 50.0;
const CRUISE_SPEED: f32 = 8.0;
const FLOCK: u32 = 1;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .add_plugins(SteeringPlugin)
        .add_plugins(DebugSteeringPlugin)
        .insert_resource(Gravity(Vec3::ZERO))
        .insert_resource(DebugSteeringConfig {
            flags: DebugSteeringFlags::COLLISION_CYLINDER | DebugSteeringFlags::STEERING_FORCE,
        })
        .add_systems(Startup, setup)
        .add_systems(Update, (sort_rocks, wrap_around))
        .run();
}

#[derive(Component)]
struct Boid;

#[derive(Component)]
struct Rock;

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let rock_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.4, 0.4, 0.45),
        ..default()
    });
    let rocks: Vec<Entity> = (0..NUM_ROCKS)
        .map(|_| {
            let radius = rand::random_range(2.0..=5.0);
            let pos = Vec3::new(
                rand::random_range(-ZONE_SIZE..=ZONE_SIZE),
                0.0,
                rand::random_range(-ZONE_SIZE..=ZONE_SIZE),
            );
            commands
                .spawn((
                    Mesh3d(meshes.add(Sphere::new(radius))),
                    MeshMaterial3d(rock_material.clone()),
                    Transform::from_translation(pos),
                    RigidBody::Static,
                    Collider::sphere(radius),
                    Obstacle,
                    BoundingRadius(radius),
                    Rock,
                ))
                .id()
        })
        .collect();

    let team = Team::new(FLOCK);
    let boid_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.8, 0.2, 0.2),
        ..default()
    });
    for _ in 0..NUM_BOIDS {
        let pos = Vec3::new(
            rand::random_range(-ZONE_SIZE..=ZONE_SIZE),
            0.0,
            rand::random_range(-ZONE_SIZE..=ZONE_SIZE),
        );
        let heading = Vec3::new(rand::random_range(-1.0..=1.0), 0.0, 1.0).normalize();
        let (Ok(align), Ok(avoid)) = (
            Align::from_team(Some(&team)).and_then(|align| align.with_max_distance(15.0)),
            Avoid::new(rocks.clone(), 30.0).and_then(|avoid| avoid.with_min_distance(20.0)),
        ) else {
            error!("Invalid steering configuration");
            return;
        };
        commands.spawn((
            Mesh3d(meshes.add(Cone::new(0.5, 1.5))),
            MeshMaterial3d(boid_material.clone()),
            Transform::from_translation(pos).with_rotation(Quat::from_rotation_arc(Vec3::Z, heading)),
            RigidBody::Dynamic,
            Collider::sphere(0.75),
            LinearVelocity(heading * CRUISE_SPEED),
            SteeringAgent::default().with_max_force(Vec3::splat(20.0)),
            BoundingRadius(0.75),
            team,
            align.with_strength(0.5),
            avoid.with_strength(4.0),
            Boid,
        ));
    }

    // Top-down camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 150.0, 0.1).looking_at(Vec3::ZERO, Vec3::Z),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Keep each boid's obstacle list nearest first so the avoidance scan
/// can stop at the first rock that is out of range.
fn sort_rocks(mut query: Query<(Entity, &mut Avoid), With<Boid>>, snapshots: Res<KinematicSnapshots>) {
    for (entity, mut avoid) in query.iter_mut() {
        sort_obstacles_by_distance(entity, avoid.obstacles_mut(), &snapshots);
    }
}

/// Boids leaving the zone re-enter on the opposite side.
fn wrap_around(mut query: Query<&mut Transform, With<Boid>>) {
    for mut transform in query.iter_mut() {
        let pos = &mut transform.translation;
        if pos.x.abs() > ZONE_SIZE {
            pos.x = -pos.x.signum() * ZONE_SIZE;
        }
        if pos.z.abs() > ZONE_SIZE {
            pos.z = -pos.z.signum() * ZONE_SIZE;
        }
    }
}
