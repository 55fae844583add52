use bevy::{input::common_conditions::input_just_pressed, prelude::*};

/// High-level groupings of systems for the app in the `Update` schedule.
/// When adding a new variant, make sure to order it in the
/// `configure_sets` call in `main.rs`.
#[derive(SystemSet, Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum AppSystems {
    /// Tick timers.
    TickTimers,
    /// Record player input.
    RecordInput,
    /// Do everything else (move the player, check walls, tilt the camera).
    Update,
}

/// Whether or not the game is paused.
#[derive(States, Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Pause(pub bool);

/// A system set for systems that shouldn't run while the game is paused.
#[derive(SystemSet, Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PausableSystems;

pub(crate) fn plugin(app: &mut App) {
    app.add_systems(
        Update,
        toggle_pause.run_if(input_just_pressed(KeyCode::Escape)),
    );
}

fn toggle_pause(
    current: Res<State<Pause>>,
    mut next: ResMut<NextState<Pause>>,
    mut virtual_time: ResMut<Time<Virtual>>,
) {
    let paused = !current.0;
    next.set(Pause(paused));
    if paused {
        virtual_time.pause();
    } else {
        virtual_time.unpause();
    }
}
