//! Development tools for the game. This plugin is only enabled in dev builds.

use crate::player::MovementConfig;
use crate::time::Pause;
use crate::wall::WallSensor;
use avian3d::prelude::PhysicsDebugPlugin;
use bevy::color::palettes::css::{GREEN, RED};
use bevy::{
    dev_tools::states::log_transitions, input::common_conditions::input_just_pressed, prelude::*,
};
use bevy_inspector_egui::bevy_egui::EguiPlugin;

pub(super) fn plugin(app: &mut App) {
    // Log `Pause` state transitions.
    app.add_systems(Update, log_transitions::<Pause>);

    // Toggle the debug overlay for UI.
    app.add_systems(
        Update,
        toggle_debug_ui.run_if(input_just_pressed(TOGGLE_KEY)),
    );
    // The wall-probe equivalent of the usual debug rays.
    app.add_systems(Update, draw_wall_probes);
    //inspect stuff and things
    app.add_plugins((
        EguiPlugin::default(),
        bevy_inspector_egui::quick::WorldInspectorPlugin::new(),
        PhysicsDebugPlugin::default(),
    ));
}

const TOGGLE_KEY: KeyCode = KeyCode::Backquote;

fn toggle_debug_ui(mut options: ResMut<UiDebugOptions>) {
    options.toggle();
}

fn draw_wall_probes(
    mut gizmos: Gizmos,
    player: Single<(&Transform, &MovementConfig, &WallSensor)>,
) {
    let (transform, config, sensor) = player.into_inner();
    let origin = transform.translation + Vec3::Y * 0.5;
    let right = transform.right() * config.wall_check_distance;

    let color = |hit: bool| if hit { GREEN } else { RED };
    gizmos.line(origin, origin + right, color(sensor.right));
    gizmos.line(origin, origin - right, color(sensor.left));
}
