use crate::player::{CharacterState, CrouchState, MovementConfig};
use crate::time::AppSystems;
use crate::wall::Sticking;
use bevy::prelude::*;

#[derive(Component)]
struct HudReadout;

pub(crate) fn plugin(app: &mut App) {
    app.add_systems(Startup, spawn_hud)
        .add_systems(Update, update_hud.after(AppSystems::Update));
}

fn spawn_hud(mut commands: Commands) {
    commands.spawn((
        Name::new("Hud"),
        HudReadout,
        Text::new(""),
        TextFont::from_font_size(16.0),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
    ));
}

fn update_hud(
    player: Single<(&CharacterState, &CrouchState, &MovementConfig, Has<Sticking>)>,
    mut readout: Single<&mut Text, With<HudReadout>>,
) {
    let (state, crouch, config, sticking) = player.into_inner();
    let posture = if sticking {
        "wall-stick"
    } else if crouch.crouching {
        "crouched"
    } else if state.grounded {
        "grounded"
    } else {
        "airborne"
    };
    readout.0 = format!(
        "speed {:5.1}\njumps {}/{}\n{posture}",
        state.velocity.length(),
        state.jump_count,
        config.max_jumps,
    );
}
