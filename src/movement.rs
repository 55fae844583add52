//! Per-frame character movement: grounding, horizontal locomotion, jumping,
//! gravity integration and crouching. Runs in the order fixed by
//! [`PlayerSet`], once per rendered frame.

use crate::char_controller::prelude::*;
use crate::input::PlayerInput;
use crate::player::{CharacterState, CrouchState, JumpCooldown, MovementConfig, PlayerSet};
use crate::time::{AppSystems, PausableSystems};
use crate::wall::Sticking;
use avian3d::prelude::*;
use bevy::prelude::*;

/// Velocity applied while grounded so the controller keeps pressing into the
/// floor instead of floating over small bumps.
pub const GROUND_STICK_VELOCITY: f32 = -2.0;

pub(crate) fn plugin(app: &mut App) {
    app.add_systems(
        Update,
        tick_jump_cooldowns
            .in_set(AppSystems::TickTimers)
            .in_set(PausableSystems),
    );
    app.add_systems(
        Update,
        (
            (update_grounded, horizontal_move).chain().in_set(PlayerSet::Locomotion),
            jump_and_gravity.in_set(PlayerSet::JumpGravity),
            crouch.in_set(PlayerSet::Crouch),
        ),
    );
}

fn tick_jump_cooldowns(time: Res<Time>, mut cooldowns: Query<&mut JumpCooldown>) {
    for mut cooldown in &mut cooldowns {
        cooldown.tick(time.delta());
    }
}

/// Initial upward velocity that reaches `jump_height` at its apex.
pub fn jump_velocity(jump_height: f32, gravity: f32) -> f32 {
    (2.0 * jump_height * gravity.abs()).sqrt()
}

/// Accumulates gravity into a vertical velocity, optionally clamped to a
/// terminal-velocity floor.
pub fn integrate_gravity(
    vertical: f32,
    gravity: f32,
    terminal_velocity: Option<f32>,
    dt: f32,
) -> f32 {
    let vertical = vertical + gravity * dt;
    match terminal_velocity {
        Some(terminal) => vertical.max(-terminal.abs()),
        None => vertical,
    }
}

/// Grants a jump when the counter and the cooldown gate allow it.
/// Returns whether the jump happened.
pub fn apply_jump(
    state: &mut CharacterState,
    cooldown: &mut JumpCooldown,
    config: &MovementConfig,
) -> bool {
    if state.jump_count >= config.max_jumps || cooldown.blocked() {
        return false;
    }
    state.velocity.y = jump_velocity(config.jump_height, config.gravity);
    state.jump_count += 1;
    cooldown.arm(config.jump_cooldown);
    true
}

/// Applies a ground-check result. An ascending body is never grounded:
/// right after a jump the feet are still within check range of the floor,
/// and grounding there would clamp the launch velocity and reset the jump
/// counter mid-air.
pub fn settle_on_ground(state: &mut CharacterState, ground_hit: bool) {
    state.grounded = ground_hit && state.velocity.y <= 0.0;
    if state.grounded {
        state.jump_count = 0;
        state.velocity.y = GROUND_STICK_VELOCITY;
    }
}

/// Per-frame vertical velocity update. Wall-sticking holds the velocity for
/// the frame; otherwise gravity accumulates.
pub fn vertical_velocity(
    vertical: f32,
    gravity: f32,
    terminal_velocity: Option<f32>,
    sticking: bool,
    dt: f32,
) -> f32 {
    if sticking {
        vertical
    } else {
        integrate_gravity(vertical, gravity, terminal_velocity, dt)
    }
}

/// Picks the locomotion speed for this frame. Wall-running overrides the
/// ground speeds; crouching vetoes the run modifier.
pub fn locomotion_speed(
    config: &MovementConfig,
    run_held: bool,
    crouching: bool,
    sticking: bool,
) -> f32 {
    let running = run_held && !crouching;
    if sticking {
        if running {
            config.wall_run_sprint_speed
        } else {
            config.wall_run_speed
        }
    } else if running {
        config.run_speed
    } else {
        config.walk_speed
    }
}

/// Queries the collision system for ground contact under the feet. Grounding
/// resets the jump counter and pins the vertical velocity to the stick value.
fn update_grounded(
    spatial_query: SpatialQuery,
    player: Single<(
        Entity,
        &Transform,
        &Collider,
        &MovementConfig,
        &mut CharacterState,
    )>,
) {
    let (entity, transform, collider, config, mut state) = player.into_inner();
    let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);
    let hit = spatial_query.cast_shape(
        collider,
        transform.translation,
        transform.rotation,
        Dir3::NEG_Y,
        &ShapeCastConfig::from_max_distance(config.ground_check_distance),
        &filter,
    );

    settle_on_ground(&mut state, hit.is_some());
}

/// Converts the movement axes into a world-space move along the body's
/// current orientation and issues one collision-resolved move.
fn horizontal_move(
    move_and_slide: MoveAndSlide,
    time: Res<Time>,
    player: Single<(
        Entity,
        &mut Transform,
        &Collider,
        &MovementConfig,
        &mut CharacterState,
        &CrouchState,
        &PlayerInput,
        Has<Sticking>,
    )>,
) {
    let (entity, mut transform, collider, config, mut state, crouch, input, sticking) =
        player.into_inner();

    let direction =
        transform.right() * input.movement.x + transform.forward() * input.movement.y;
    let speed = locomotion_speed(config, input.run, crouch.crouching, sticking);
    let horizontal = direction * speed;

    state.velocity.x = horizontal.x;
    state.velocity.z = horizontal.z;

    let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);
    let output = move_and_slide.move_and_slide(
        collider,
        transform.translation,
        transform.rotation,
        horizontal,
        time.delta(),
        &MoveAndSlideConfig::default(),
        &filter,
    );
    transform.translation = output.position;
}

/// Handles the jump request, integrates gravity (unless wall-sticking
/// suppresses it this frame) and issues the vertical collision-resolved move.
fn jump_and_gravity(
    move_and_slide: MoveAndSlide,
    time: Res<Time>,
    player: Single<(
        Entity,
        &mut Transform,
        &Collider,
        &MovementConfig,
        &mut CharacterState,
        &mut JumpCooldown,
        &mut PlayerInput,
        Has<Sticking>,
    )>,
) {
    let (entity, mut transform, collider, config, mut state, mut cooldown, mut input, sticking) =
        player.into_inner();

    if std::mem::take(&mut input.jump_pressed) {
        apply_jump(&mut state, &mut cooldown, config);
    }

    state.velocity.y = vertical_velocity(
        state.velocity.y,
        config.gravity,
        config.terminal_velocity,
        sticking,
        time.delta_secs(),
    );

    let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);
    let output = move_and_slide.move_and_slide(
        collider,
        transform.translation,
        transform.rotation,
        Vec3::new(0.0, state.velocity.y, 0.0),
        time.delta(),
        &MoveAndSlideConfig::default(),
        &filter,
    );
    transform.translation = output.position;
    // Ceilings and floors kill the vertical velocity through the projection.
    state.velocity.y = output.projected_velocity.y;
}

/// Swaps the collider between the standing and crouched capsules. The swap
/// only happens on an actual transition, repeated input is a no-op.
fn crouch(
    player: Single<(
        &mut Collider,
        &mut CrouchState,
        &MovementConfig,
        &PlayerInput,
    )>,
) {
    let (mut collider, mut crouch, config, input) = player.into_inner();
    if let Some(height) = crouch.desired_height(input.crouch) {
        *collider = Collider::capsule(config.collider_radius, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn jump_velocity_matches_kinematics() {
        // sqrt(2 * 1.5 * 9.81)
        let v = jump_velocity(1.5, -9.81);
        assert!((v - 5.4249).abs() < 1e-3);
    }

    #[test]
    fn jump_from_grounded_stick_velocity() {
        let config = MovementConfig::default();
        let mut state = CharacterState {
            velocity: Vec3::new(0.0, GROUND_STICK_VELOCITY, 0.0),
            grounded: true,
            ..default()
        };
        let mut cooldown = JumpCooldown::default();

        assert!(apply_jump(&mut state, &mut cooldown, &config));
        assert!((state.velocity.y - 5.4249).abs() < 1e-3);
        assert_eq!(state.jump_count, 1);
    }

    #[test]
    fn jump_count_never_exceeds_max() {
        let config = MovementConfig {
            jump_cooldown: 0.0,
            ..default()
        };
        let mut state = CharacterState::default();
        let mut cooldown = JumpCooldown::default();

        for _ in 0..5 {
            apply_jump(&mut state, &mut cooldown, &config);
            cooldown.tick(Duration::from_millis(1));
        }
        assert_eq!(state.jump_count, config.max_jumps);
    }

    #[test]
    fn second_jump_rejected_within_cooldown_window() {
        let config = MovementConfig::default();
        let mut state = CharacterState::default();
        let mut cooldown = JumpCooldown::default();

        assert!(apply_jump(&mut state, &mut cooldown, &config));
        // Airborne, count below max, but the cooldown lock is held.
        assert!(!apply_jump(&mut state, &mut cooldown, &config));
        assert_eq!(state.jump_count, 1);

        cooldown.tick(Duration::from_secs_f32(config.jump_cooldown + 0.01));
        assert!(apply_jump(&mut state, &mut cooldown, &config));
        assert_eq!(state.jump_count, 2);
    }

    #[test]
    fn fresh_jump_survives_ground_check() {
        let config = MovementConfig::default();
        let mut state = CharacterState {
            velocity: Vec3::new(0.0, GROUND_STICK_VELOCITY, 0.0),
            grounded: true,
            ..default()
        };
        let mut cooldown = JumpCooldown::default();
        assert!(apply_jump(&mut state, &mut cooldown, &config));

        // One frame later the body has risen ~0.09 m at 60 FPS, still well
        // within check range of the floor, so the cast reports a hit.
        state.velocity.y =
            vertical_velocity(state.velocity.y, config.gravity, None, false, 1.0 / 60.0);
        settle_on_ground(&mut state, true);

        assert!(!state.grounded);
        assert!(state.velocity.y > 5.0, "launch velocity clamped away");
        assert_eq!(state.jump_count, 1);

        // Once the arc comes back down, the hit grounds as usual.
        state.velocity.y = -3.0;
        settle_on_ground(&mut state, true);
        assert!(state.grounded);
        assert_eq!(state.velocity.y, GROUND_STICK_VELOCITY);
        assert_eq!(state.jump_count, 0);
    }

    #[test]
    fn ground_check_miss_never_grounds() {
        let mut state = CharacterState {
            velocity: Vec3::new(0.0, -3.0, 0.0),
            grounded: true,
            ..default()
        };
        settle_on_ground(&mut state, false);
        assert!(!state.grounded);
        assert_eq!(state.velocity.y, -3.0);
    }

    #[test]
    fn wall_stick_suppresses_gravity_for_the_frame() {
        let held = vertical_velocity(0.0, -9.81, None, true, 1.0 / 60.0);
        assert_eq!(held, 0.0);
        let falling = vertical_velocity(0.0, -9.81, None, false, 1.0 / 60.0);
        assert!(falling < 0.0);
    }

    #[test]
    fn gravity_accumulates_per_frame() {
        let v = integrate_gravity(0.0, -9.81, None, 0.5);
        assert!((v + 4.905).abs() < 1e-4);
        // Unclamped: keeps growing.
        let v = integrate_gravity(-100.0, -9.81, None, 1.0);
        assert!(v < -100.0);
    }

    #[test]
    fn terminal_velocity_floors_fall_speed() {
        let v = integrate_gravity(-52.0, -9.81, Some(53.0), 1.0);
        assert_eq!(v, -53.0);
        // Sign of the configured terminal value doesn't matter.
        let v = integrate_gravity(-52.0, -9.81, Some(-53.0), 1.0);
        assert_eq!(v, -53.0);
    }

    #[test]
    fn run_modifier_vetoed_by_crouch() {
        let config = MovementConfig::default();
        assert_eq!(locomotion_speed(&config, false, false, false), 5.0);
        assert_eq!(locomotion_speed(&config, true, false, false), 12.0);
        assert_eq!(locomotion_speed(&config, true, true, false), 5.0);
    }

    #[test]
    fn wall_run_speeds_override_ground_speeds() {
        let config = MovementConfig::default();
        assert_eq!(locomotion_speed(&config, false, false, true), 8.0);
        assert_eq!(locomotion_speed(&config, true, false, true), 15.0);
    }
}
