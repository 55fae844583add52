use crate::player::{CharacterState, MovementConfig};
use crate::time::PausableSystems;
use avian3d::prelude::*;
use bevy::prelude::*;

/// Collision layers. Wall probes only test against [`GameLayer::Wall`];
/// everything collides with everything for movement purposes.
#[derive(PhysicsLayer, Default, Clone, Copy, Debug)]
pub enum GameLayer {
    #[default]
    Default,
    Wall,
}

pub(crate) fn plugin(app: &mut App) {
    app.add_plugins(PhysicsPlugins::default())
        .add_systems(FixedUpdate, speed_governor.in_set(PausableSystems));
}

/// Caps the body's overall velocity once per physics step, decoupled from the
/// variable-rate frame loop. Skipped entirely while movement is disabled.
fn speed_governor(mut bodies: Query<(&MovementConfig, &mut CharacterState)>) {
    for (config, mut state) in &mut bodies {
        if !state.movement_enabled {
            continue;
        }
        state.velocity = clamp_magnitude(state.velocity, config.max_speed);
    }
}

/// Rescales `vector` to `max_magnitude` when it exceeds it, preserving
/// direction. Compared squared to avoid the root in the common case.
pub fn clamp_magnitude(vector: Vec3, max_magnitude: f32) -> Vec3 {
    if vector.length_squared() > max_magnitude * max_magnitude {
        vector.normalize() * max_magnitude
    } else {
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_magnitude_leaves_slow_vectors_alone() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(clamp_magnitude(v, 10.0), v);
    }

    #[test]
    fn clamp_magnitude_rescales_and_preserves_direction() {
        let v = Vec3::new(300.0, 0.0, 400.0);
        let clamped = clamp_magnitude(v, 150.0);
        assert!((clamped.length() - 150.0).abs() < 1e-3);
        let cos = clamped.normalize().dot(v.normalize());
        assert!((cos - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_magnitude_boundary_is_untouched() {
        let v = Vec3::new(150.0, 0.0, 0.0);
        assert_eq!(clamp_magnitude(v, 150.0), v);
    }
}
