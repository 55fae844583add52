//! A small test arena: a ground slab and a corridor of wall-layer slabs to
//! run along. Geometry only, the interesting parts live elsewhere.

use crate::physics::GameLayer;
use avian3d::prelude::*;
use bevy::prelude::*;
use rand::Rng;

pub(crate) fn plugin(app: &mut App) {
    app.add_systems(Startup, setup_level);
}

fn setup_level(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(12.0, 30.0, 8.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let ground_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.25, 0.3, 0.25),
        perceptual_roughness: 0.9,
        ..default()
    });
    commands.spawn((
        Name::new("Ground"),
        RigidBody::Static,
        Collider::cuboid(120.0, 1.0, 120.0),
        Mesh3d(meshes.add(Cuboid::new(120.0, 1.0, 120.0))),
        MeshMaterial3d(ground_material),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));

    // A corridor of wall pairs with jittered heights, close enough together
    // that both lateral probes can reach one side or the other.
    let wall_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.5, 0.45, 0.4),
        ..default()
    });
    let mut rng = rand::rng();
    for i in 0..8 {
        let z = -6.0 - 9.0 * i as f32;
        let height = rng.random_range(5.0..9.0);
        for x in [-2.5, 2.5] {
            commands.spawn((
                Name::new(format!("Wall {i}{}", if x < 0.0 { "L" } else { "R" })),
                RigidBody::Static,
                Collider::cuboid(0.6, height, 7.0),
                CollisionLayers::new(GameLayer::Wall, LayerMask::ALL),
                Mesh3d(meshes.add(Cuboid::new(0.6, height, 7.0))),
                MeshMaterial3d(wall_material.clone()),
                Transform::from_xyz(x, height / 2.0, z),
            ));
        }
    }
}
