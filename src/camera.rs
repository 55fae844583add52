//! The first-person camera: composes pitch (from [`LookState`]) and roll
//! (from [`CameraTilt`]) into the camera's local rotation, and owns cursor
//! grabbing. This is the only writer of the camera transform.

use crate::look::LookState;
use crate::player::{CrouchState, MovementConfig, Player, PlayerSet};
use crate::time::Pause;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};

/// Marker for the player's first-person camera.
#[derive(Component)]
pub struct PlayerCamera;

/// Eye height as a fraction of the current collider height.
pub const EYE_HEIGHT_FRACTION: f32 = 0.45;

/// Camera roll, tracked as an independent persistent scalar in degrees.
/// Deliberately never extracted back out of the composed rotation, which
/// would be ambiguous at high pitch.
#[derive(Component, Debug, Default, Reflect)]
pub struct CameraTilt {
    pub roll: f32,
    /// Where the roll is headed: ±tilt angle while wall-sticking, 0 otherwise.
    pub target: f32,
}

impl CameraTilt {
    /// Moves the roll toward the target at `rate` per second, shortest way
    /// around. An infinite rate snaps, which is the non-smoothed variant.
    pub fn settle(&mut self, rate: f32, dt: f32) {
        self.roll = approach_angle(self.roll, self.target, rate, dt);
    }
}

/// Shortest-angle interpolation of `current` toward `target` (degrees) by the
/// fraction `rate * dt`, capped at arriving exactly.
pub fn approach_angle(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    if !rate.is_finite() {
        return target;
    }
    let difference = (target - current).rem_euclid(360.0);
    let difference = if difference > 180.0 {
        difference - 360.0
    } else {
        difference
    };
    current + difference * (rate * dt).min(1.0)
}

pub(crate) fn plugin(app: &mut App) {
    app.register_type::<CameraTilt>();
    app.add_systems(
        Update,
        (settle_tilt, compose_camera).chain().in_set(PlayerSet::Camera),
    );
    app.add_systems(OnEnter(Pause(false)), grab_cursor);
    app.add_systems(OnEnter(Pause(true)), release_cursor);
    app.add_systems(Startup, grab_cursor);
}

fn settle_tilt(
    time: Res<Time>,
    config: Single<&MovementConfig, With<Player>>,
    camera: Option<Single<&mut CameraTilt, With<PlayerCamera>>>,
) {
    let Some(mut tilt) = camera else {
        // Movement keeps working without a camera, the tilt is just inert.
        warn_once!("no player camera bound, camera tilt disabled");
        return;
    };
    tilt.settle(config.wall_tilt_speed, time.delta_secs());
}

/// Writes the camera's local rotation from the pitch and roll scalars,
/// leaving yaw on the body, and keeps the eye at the height of the current
/// posture so crouching lowers the view.
fn compose_camera(
    player: Single<(&LookState, &CrouchState), With<Player>>,
    camera: Option<Single<(&mut Transform, &CameraTilt), With<PlayerCamera>>>,
) {
    let Some(camera) = camera else {
        warn_once!("no player camera bound, mouse pitch disabled");
        return;
    };
    let (look, crouch) = player.into_inner();
    let (mut transform, tilt) = camera.into_inner();
    transform.rotation = Quat::from_euler(
        EulerRot::YXZ,
        0.0,
        look.pitch_degrees().to_radians(),
        tilt.roll.to_radians(),
    );
    transform.translation.y = crouch.height() * EYE_HEIGHT_FRACTION;
}

fn grab_cursor(cursor: Option<Single<&mut CursorOptions, With<PrimaryWindow>>>) {
    let Some(mut cursor) = cursor else {
        return;
    };
    cursor.grab_mode = CursorGrabMode::Locked;
    cursor.visible = false;
}

fn release_cursor(cursor: Option<Single<&mut CursorOptions, With<PrimaryWindow>>>) {
    let Some(mut cursor) = cursor else {
        return;
    };
    cursor.grab_mode = CursorGrabMode::None;
    cursor.visible = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilt_approach_is_monotonic_and_converges() {
        let mut roll = 0.0;
        let mut previous = roll;
        // 5 simulated seconds at 60 Hz, rate 5/s toward 15 degrees.
        for step in 0..300 {
            roll = approach_angle(roll, 15.0, 5.0, 1.0 / 60.0);
            assert!(roll >= previous, "tilt moved away from target");
            assert!(roll <= 15.0 + 1e-4);
            previous = roll;
            // After one second the roll is close, but not exactly there.
            if step == 59 {
                assert!(roll > 14.0);
                assert!(roll < 15.0);
            }
        }
        assert!((roll - 15.0).abs() < 0.01);
    }

    #[test]
    fn infinite_rate_reproduces_snap_variant() {
        assert_eq!(approach_angle(0.0, 15.0, f32::INFINITY, 1.0 / 60.0), 15.0);
        assert_eq!(approach_angle(15.0, 0.0, f32::INFINITY, 1.0 / 60.0), 0.0);
    }

    #[test]
    fn approach_takes_the_short_way_around() {
        // 350° to 10° should pass through 360, not spin backwards.
        let next = approach_angle(350.0, 10.0, 5.0, 0.1);
        assert!(next > 350.0);
    }

    #[test]
    fn release_settles_back_toward_zero() {
        let mut tilt = CameraTilt {
            roll: -15.0,
            target: 0.0,
        };
        let mut previous = tilt.roll;
        for _ in 0..300 {
            tilt.settle(5.0, 1.0 / 60.0);
            assert!(tilt.roll >= previous);
            previous = tilt.roll;
        }
        assert!(tilt.roll.abs() < 0.01);
    }

    #[test]
    fn overshooting_rate_lands_exactly_on_target() {
        // rate * dt > 1 must not overshoot past the target.
        let next = approach_angle(0.0, 15.0, 5.0, 10.0);
        assert_eq!(next, 15.0);
    }
}
