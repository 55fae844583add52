//! Wall adjacency sensing and the wall-stick behavior: while airborne next to
//! a wall with the stick input held, gravity is suppressed, horizontal
//! velocity is zeroed and the camera rolls toward the wall.

use crate::camera::{CameraTilt, PlayerCamera};
use crate::input::PlayerInput;
use crate::physics::GameLayer;
use crate::player::{CharacterState, MovementConfig, PlayerSet};
use avian3d::prelude::*;
use bevy::prelude::*;
use seldom_state::prelude::*;

/// Not adhering to any wall. The initial state.
#[derive(Clone, Component)]
#[component(storage = "SparseSet")]
pub struct Free;

/// Adhering to a wall: gravity off, horizontal velocity zeroed, camera
/// tilted. Entered and left purely based on the per-frame condition,
/// there is no hysteresis.
#[derive(Clone, Component)]
#[component(storage = "SparseSet")]
pub struct Sticking;

/// Result of the two lateral wall probes, recomputed every frame.
/// Only current-frame data, nothing persists here.
#[derive(Component, Debug, Default)]
pub struct WallSensor {
    pub left: bool,
    pub right: bool,
    pub left_hit: Option<RayHitData>,
    pub right_hit: Option<RayHitData>,
}

pub(crate) fn plugin(app: &mut App) {
    app.add_systems(
        Update,
        (
            wall_check.in_set(PlayerSet::WallCheck),
            wall_stick_effects.in_set(PlayerSet::WallStick),
        ),
    );
    app.add_observer(on_stick_entered).add_observer(on_stick_left);
}

/// The wall-stick condition: airborne, next to a wall, stick input held.
pub fn stick_condition(grounded: bool, wall_left: bool, wall_right: bool, stick_held: bool) -> bool {
    !grounded && (wall_left || wall_right) && stick_held
}

/// Roll target while sticking: negative toward a left wall, positive toward
/// a right wall. A left wall wins when both probes hit.
pub fn tilt_target(wall_left: bool, wall_right: bool, angle: f32) -> f32 {
    if wall_left {
        -angle
    } else if wall_right {
        angle
    } else {
        0.0
    }
}

/// State machine trigger: enter [`Sticking`].
pub fn wall_stick_valid(
    In(entity): In<Entity>,
    players: Query<(&CharacterState, &WallSensor, &PlayerInput)>,
) -> bool {
    players.get(entity).is_ok_and(|(state, sensor, input)| {
        stick_condition(state.grounded, sensor.left, sensor.right, input.stick)
    })
}

/// State machine trigger: fall back to [`Free`].
pub fn wall_stick_lost(
    In(entity): In<Entity>,
    players: Query<(&CharacterState, &WallSensor, &PlayerInput)>,
) -> bool {
    !players.get(entity).is_ok_and(|(state, sensor, input)| {
        stick_condition(state.grounded, sensor.left, sensor.right, input.stick)
    })
}

/// Casts the two short lateral rays against the wall layer. Runs
/// unconditionally, callers gate on grounded state.
fn wall_check(
    spatial_query: SpatialQuery,
    player: Single<(Entity, &Transform, &MovementConfig, &mut WallSensor)>,
) {
    let (entity, transform, config, mut sensor) = player.into_inner();
    // Probe from roughly hip height rather than the feet.
    let origin = transform.translation + Vec3::Y * 0.5;
    let filter =
        SpatialQueryFilter::from_mask(GameLayer::Wall).with_excluded_entities([entity]);
    let right = transform.right();

    sensor.right_hit =
        spatial_query.cast_ray(origin, right, config.wall_check_distance, true, &filter);
    sensor.left_hit =
        spatial_query.cast_ray(origin, -right, config.wall_check_distance, true, &filter);
    sensor.right = sensor.right_hit.is_some();
    sensor.left = sensor.left_hit.is_some();
}

/// Applies the per-frame consequences of the current stick state: horizontal
/// velocity zeroed while sticking (vertical preserved), and the camera roll
/// target pointed at the wall or back to zero.
fn wall_stick_effects(
    player: Single<(&mut CharacterState, &WallSensor, &MovementConfig, Has<Sticking>)>,
    camera: Option<Single<&mut CameraTilt, With<PlayerCamera>>>,
) {
    let (mut state, sensor, config, sticking) = player.into_inner();

    if sticking {
        state.velocity.x = 0.0;
        state.velocity.z = 0.0;
    }

    if let Some(mut tilt) = camera {
        tilt.target = if sticking {
            tilt_target(sensor.left, sensor.right, config.wall_tilt_angle)
        } else {
            0.0
        };
    }
}

fn on_stick_entered(_: On<Add, Sticking>) {
    debug!("wall stick engaged");
}

fn on_stick_left(_: On<Add, Free>) {
    debug!("wall stick released");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stick_requires_airborne_wall_and_input() {
        assert!(stick_condition(false, true, false, true));
        assert!(stick_condition(false, false, true, true));
        // Grounded.
        assert!(!stick_condition(true, true, false, true));
        // No wall on either side.
        assert!(!stick_condition(false, false, false, true));
        // Input released.
        assert!(!stick_condition(false, true, false, false));
    }

    #[test]
    fn tilt_sign_follows_the_wall_side() {
        assert_eq!(tilt_target(true, false, 15.0), -15.0);
        assert_eq!(tilt_target(false, true, 15.0), 15.0);
        assert_eq!(tilt_target(false, false, 15.0), 0.0);
        // Wedged between two walls, the left one wins.
        assert_eq!(tilt_target(true, true, 15.0), -15.0);
    }
}
