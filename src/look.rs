//! Mouse look. One system owns both rotation channels the player controls:
//! yaw goes straight onto the body, pitch accumulates here and is read by the
//! camera composition in `camera.rs`. Nothing else writes either.

use crate::input::PlayerInput;
use crate::player::{MovementConfig, PlayerSet};
use bevy::prelude::*;

/// Accumulated camera pitch in degrees, always within ±90.
#[derive(Component, Debug, Default, Reflect)]
pub struct LookState {
    pitch: f32,
}

impl LookState {
    pub const PITCH_LIMIT: f32 = 90.0;

    /// Applies a scaled mouse-Y delta. Moving the mouse up looks up,
    /// hence the subtraction.
    pub fn accumulate(&mut self, delta_degrees: f32) {
        self.pitch = (self.pitch - delta_degrees).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    pub fn pitch_degrees(&self) -> f32 {
        self.pitch
    }
}

pub(crate) fn plugin(app: &mut App) {
    app.register_type::<LookState>()
        .add_systems(Update, look.in_set(PlayerSet::Look));
}

fn look(
    time: Res<Time>,
    player: Single<(&mut Transform, &mut LookState, &mut PlayerInput, &MovementConfig)>,
) {
    let (mut transform, mut look, mut input, config) = player.into_inner();
    let delta = std::mem::take(&mut input.look) * config.mouse_sensitivity * time.delta_secs();

    look.accumulate(delta.y);
    transform.rotate_y(-delta.x.to_radians());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_clamps_to_quarter_turns() {
        let mut look = LookState::default();
        look.accumulate(-500.0);
        assert_eq!(look.pitch_degrees(), 90.0);
        look.accumulate(1000.0);
        assert_eq!(look.pitch_degrees(), -90.0);
    }

    #[test]
    fn pitch_clamped_for_any_delta_sequence() {
        let mut look = LookState::default();
        for delta in [3.0, -17.0, 250.0, -1e6, 42.0, 1e6, f32::MIN_POSITIVE] {
            look.accumulate(delta);
            assert!(look.pitch_degrees() >= -90.0);
            assert!(look.pitch_degrees() <= 90.0);
        }
    }

    #[test]
    fn upward_mouse_motion_pitches_up() {
        let mut look = LookState::default();
        // Negative delta (mouse up after the subtraction convention).
        look.accumulate(-10.0);
        assert_eq!(look.pitch_degrees(), 10.0);
    }
}
