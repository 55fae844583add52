use crate::player::Player;
use bevy::prelude::*;
use bevy_enhanced_input::prelude::*;

/// Two-axis locomotion input (strafe, forward).
#[derive(InputAction)]
#[action_output(Vec2)]
pub struct Move;

/// Mouse-look deltas.
#[derive(InputAction)]
#[action_output(Vec2)]
pub struct Look;

#[derive(InputAction)]
#[action_output(bool)]
pub struct Jump;

/// Sprint modifier.
#[derive(InputAction)]
#[action_output(bool)]
pub struct Run;

#[derive(InputAction)]
#[action_output(bool)]
pub struct Crouch;

/// Held to adhere to an adjacent wall while airborne.
/// Deliberately shares a binding with [`Jump`].
#[derive(InputAction)]
#[action_output(bool)]
pub struct Stick;

/// Snapshot of this frame's input, written by the action observers and read
/// by the movement systems so they see one coherent poll per frame.
///
/// `look` and `jump_pressed` are edges: the consuming system clears them.
#[derive(Component, Debug, Default, Reflect)]
pub struct PlayerInput {
    pub movement: Vec2,
    pub look: Vec2,
    pub jump_pressed: bool,
    pub run: bool,
    pub crouch: bool,
    pub stick: bool,
}

pub(crate) fn plugin(app: &mut App) {
    app.add_plugins(EnhancedInputPlugin)
        .add_input_context::<Player>()
        .register_type::<PlayerInput>();

    app.add_observer(record_move)
        .add_observer(clear_move)
        .add_observer(record_look)
        .add_observer(record_jump)
        .add_observer(run_started)
        .add_observer(run_completed)
        .add_observer(crouch_started)
        .add_observer(crouch_completed)
        .add_observer(stick_started)
        .add_observer(stick_completed);
}

/// Action entities for the player context, spawned together with the player.
pub fn player_actions() -> impl Bundle {
    actions!(Player[
        (
            Action::<Move>::new(),
            DeadZone::default(),
            Bindings::spawn((Cardinal::wasd_keys(), Axial::left_stick())),
        ),
        (
            Action::<Look>::new(),
            Bindings::spawn_one(Binding::mouse_motion()),
        ),
        (
            Action::<Jump>::new(),
            bindings![KeyCode::Space, GamepadButton::South],
        ),
        (
            Action::<Run>::new(),
            bindings![KeyCode::ShiftLeft, GamepadButton::LeftThumb],
        ),
        (
            Action::<Crouch>::new(),
            bindings![KeyCode::ControlLeft, GamepadButton::East],
        ),
        (
            Action::<Stick>::new(),
            bindings![KeyCode::Space, GamepadButton::RightTrigger],
        ),
    ])
}

fn record_move(fired: On<Fired<Move>>, mut input: Single<&mut PlayerInput>) {
    input.movement = fired.value;
}

fn clear_move(_: On<Completed<Move>>, mut input: Single<&mut PlayerInput>) {
    input.movement = Vec2::ZERO;
}

fn record_look(fired: On<Fired<Look>>, mut input: Single<&mut PlayerInput>) {
    input.look += fired.value;
}

fn record_jump(_: On<Started<Jump>>, mut input: Single<&mut PlayerInput>) {
    input.jump_pressed = true;
}

fn run_started(_: On<Started<Run>>, mut input: Single<&mut PlayerInput>) {
    input.run = true;
}

fn run_completed(_: On<Completed<Run>>, mut input: Single<&mut PlayerInput>) {
    input.run = false;
}

fn crouch_started(_: On<Started<Crouch>>, mut input: Single<&mut PlayerInput>) {
    input.crouch = true;
}

fn crouch_completed(_: On<Completed<Crouch>>, mut input: Single<&mut PlayerInput>) {
    input.crouch = false;
}

fn stick_started(_: On<Started<Stick>>, mut input: Single<&mut PlayerInput>) {
    input.stick = true;
}

fn stick_completed(_: On<Completed<Stick>>, mut input: Single<&mut PlayerInput>) {
    input.stick = false;
}
