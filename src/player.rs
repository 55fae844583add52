use crate::camera::{CameraTilt, EYE_HEIGHT_FRACTION, PlayerCamera};
use crate::input::{self, PlayerInput};
use crate::look::LookState;
use crate::time::{AppSystems, PausableSystems};
use crate::wall::{Free, Sticking, WallSensor, wall_stick_lost, wall_stick_valid};
use avian3d::prelude::*;
use bevy::prelude::*;
use seldom_state::prelude::*;
use serde::Deserialize;
use std::fs::read_to_string;

/// Where movement tuning overrides live. Missing or malformed files fall back
/// to [`MovementConfig::default`] with a warning.
const CONFIG_PATH: &str = "assets/config/player.ron";

/// The player character. Doubles as the input context marker.
#[derive(Component)]
pub struct Player;

/// All movement tuning in one place, so the walk/run/terminal-velocity
/// variants are configuration rather than separate controllers.
///
/// Angles are in degrees, speeds in meters per second.
#[derive(Component, Clone, Debug, Deserialize, Reflect)]
#[serde(default)]
pub struct MovementConfig {
    pub walk_speed: f32,
    pub run_speed: f32,
    /// Locomotion speed while adhering to a wall.
    pub wall_run_speed: f32,
    /// Locomotion speed while adhering to a wall with the run modifier held.
    pub wall_run_sprint_speed: f32,
    pub jump_height: f32,
    /// Downward acceleration, negative.
    pub gravity: f32,
    /// Optional floor for downward velocity. `None` leaves gravity unclamped.
    pub terminal_velocity: Option<f32>,
    pub max_jumps: u32,
    /// Seconds during which a granted jump blocks further jumps.
    pub jump_cooldown: f32,
    pub mouse_sensitivity: f32,
    /// Cap applied to the body's overall velocity once per physics step.
    pub max_speed: f32,
    pub collider_radius: f32,
    pub standing_height: f32,
    pub crouch_height: f32,
    /// Length of the downward grounding probe.
    pub ground_check_distance: f32,
    /// Length of the lateral wall probes.
    pub wall_check_distance: f32,
    /// Camera roll magnitude while wall-sticking, degrees.
    pub wall_tilt_angle: f32,
    /// Angular rate at which the roll approaches its target, per second.
    /// `inf` snaps instantly.
    pub wall_tilt_speed: f32,
    pub camera_fov: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            run_speed: 12.0,
            wall_run_speed: 8.0,
            wall_run_sprint_speed: 15.0,
            jump_height: 1.5,
            gravity: -9.81,
            terminal_velocity: None,
            max_jumps: 2,
            jump_cooldown: 1.0,
            mouse_sensitivity: 100.0,
            max_speed: 150.0,
            collider_radius: 0.4,
            standing_height: 1.8,
            crouch_height: 0.5,
            ground_check_distance: 0.2,
            wall_check_distance: 1.0,
            wall_tilt_angle: 15.0,
            wall_tilt_speed: 5.0,
            camera_fov: 103.0,
        }
    }
}

impl MovementConfig {
    /// Reads the config from `path`, falling back to defaults when the file is
    /// missing or unparseable. Movement must keep working either way.
    pub fn load_or_default(path: &str) -> Self {
        let Ok(contents) = read_to_string(path) else {
            warn!("no movement config at {path}, using defaults");
            return Self::default();
        };
        ron::de::from_str(&contents)
            .map_err(|e| warn!("could not parse {path}: {e}"))
            .unwrap_or_default()
    }

    pub fn standing_collider(&self) -> Collider {
        Collider::capsule(self.collider_radius, self.standing_height)
    }

    pub fn crouched_collider(&self) -> Collider {
        Collider::capsule(self.collider_radius, self.crouch_height)
    }
}

/// Per-frame body state: everything the integrator and locomotion mutate.
#[derive(Component, Debug, Reflect)]
pub struct CharacterState {
    /// Current velocity. Horizontal components are rebuilt from input each
    /// frame; `y` is the integrated vertical velocity.
    pub velocity: Vec3,
    pub grounded: bool,
    pub jump_count: u32,
    /// External toggle; gates the speed governor.
    pub movement_enabled: bool,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            grounded: false,
            jump_count: 0,
            movement_enabled: true,
        }
    }
}

impl CharacterState {
    pub fn enable_movement(&mut self) {
        self.movement_enabled = true;
    }

    pub fn disable_movement(&mut self) {
        self.movement_enabled = false;
    }
}

/// Timed gate preventing jump spam. Armed when a jump is granted, released by
/// the timer ticking out; never cancelled early.
#[derive(Component, Debug, Default, Reflect)]
pub struct JumpCooldown {
    blocked: bool,
    timer: Timer,
}

impl JumpCooldown {
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn arm(&mut self, seconds: f32) {
        self.blocked = true;
        self.timer = Timer::from_seconds(seconds, TimerMode::Once);
    }

    pub fn tick(&mut self, delta: std::time::Duration) {
        if self.blocked && self.timer.tick(delta).is_finished() {
            self.blocked = false;
        }
    }
}

/// Crouch flag plus the heights needed to swap the collider back and forth.
#[derive(Component, Debug, Reflect)]
pub struct CrouchState {
    pub crouching: bool,
    /// Forbids crouch entry while set (slide mechanic hook).
    pub sliding: bool,
    standing_height: f32,
    crouch_height: f32,
}

impl CrouchState {
    pub fn new(config: &MovementConfig) -> Self {
        Self {
            crouching: false,
            sliding: false,
            standing_height: config.standing_height,
            crouch_height: config.crouch_height,
        }
    }

    /// Applies the crouch input, returning the new collider height when a
    /// transition happens. Repeated calls in the same state are no-ops.
    pub fn desired_height(&mut self, held: bool) -> Option<f32> {
        if held && !self.sliding {
            if !self.crouching {
                self.crouching = true;
                return Some(self.crouch_height);
            }
        } else if self.crouching {
            self.crouching = false;
            return Some(self.standing_height);
        }
        None
    }

    pub fn height(&self) -> f32 {
        if self.crouching {
            self.crouch_height
        } else {
            self.standing_height
        }
    }
}

/// Ordering of the per-frame character update, per the frame contract:
/// look, then horizontal move, then jump/gravity, then crouch, then wall
/// sensing, then wall-stick effects, then the camera composition.
#[derive(SystemSet, Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PlayerSet {
    Look,
    Locomotion,
    JumpGravity,
    Crouch,
    WallCheck,
    WallStick,
    Camera,
}

pub(crate) fn plugin(app: &mut App) {
    app.register_type::<MovementConfig>()
        .register_type::<CharacterState>()
        .register_type::<CrouchState>()
        .register_type::<JumpCooldown>();
    app.configure_sets(
        Update,
        (
            PlayerSet::Look,
            PlayerSet::Locomotion,
            PlayerSet::JumpGravity,
            PlayerSet::Crouch,
            PlayerSet::WallCheck,
            PlayerSet::WallStick,
            PlayerSet::Camera,
        )
            .chain()
            .in_set(AppSystems::Update)
            .in_set(PausableSystems),
    );
    app.add_systems(Startup, spawn_player);
}

fn spawn_player(mut commands: Commands) {
    let config = MovementConfig::load_or_default(CONFIG_PATH);
    let collider = config.standing_collider();
    let fov = config.camera_fov.to_radians();
    let eye_height = config.standing_height * EYE_HEIGHT_FRACTION;
    let crouch = CrouchState::new(&config);

    commands.spawn((
        Player,
        Name::new("Player"),
        Transform::from_xyz(0.0, 2.0, 0.0),
        RigidBody::Kinematic,
        collider,
        CharacterState::default(),
        crouch,
        JumpCooldown::default(),
        WallSensor::default(),
        LookState::default(),
        PlayerInput::default(),
        config,
        // Wall-stick state machine. The condition is re-evaluated every frame,
        // so losing wall contact exits immediately.
        (
            Free,
            StateMachine::default()
                .trans::<Free, _>(wall_stick_valid, Sticking)
                .trans::<Sticking, _>(wall_stick_lost, Free),
            input::player_actions(),
        ),
        children![(
            PlayerCamera,
            Name::new("PlayerCamera"),
            Camera3d::default(),
            Projection::Perspective(PerspectiveProjection {
                fov,
                ..default()
            }),
            Transform::from_xyz(0.0, eye_height, 0.0),
            CameraTilt::default(),
        )],
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_defaults_match_tuning() {
        let config = MovementConfig::default();
        assert_eq!(config.walk_speed, 5.0);
        assert_eq!(config.run_speed, 12.0);
        assert_eq!(config.max_jumps, 2);
        assert_eq!(config.gravity, -9.81);
        assert_eq!(config.max_speed, 150.0);
        assert_eq!(config.crouch_height, 0.5);
    }

    #[test]
    fn config_parses_partial_ron() {
        let config: MovementConfig = ron::de::from_str("(walk_speed: 7.5)").unwrap();
        assert_eq!(config.walk_speed, 7.5);
        // Unspecified fields keep their defaults.
        assert_eq!(config.run_speed, 12.0);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = MovementConfig::load_or_default("does/not/exist.ron");
        assert_eq!(config.walk_speed, 5.0);
    }

    #[test]
    fn crouch_toggles_once_per_state() {
        let config = MovementConfig::default();
        let mut crouch = CrouchState::new(&config);

        assert_eq!(crouch.desired_height(true), Some(0.5));
        assert!(crouch.crouching);
        // Holding crouch again is a no-op.
        assert_eq!(crouch.desired_height(true), None);

        assert_eq!(crouch.desired_height(false), Some(1.8));
        assert!(!crouch.crouching);
        assert_eq!(crouch.desired_height(false), None);
    }

    #[test]
    fn height_tracks_posture() {
        let config = MovementConfig::default();
        let mut crouch = CrouchState::new(&config);
        assert_eq!(crouch.height(), 1.8);

        crouch.desired_height(true);
        assert_eq!(crouch.height(), 0.5);

        crouch.desired_height(false);
        assert_eq!(crouch.height(), 1.8);
    }

    #[test]
    fn sliding_forbids_crouch_entry_and_forces_exit() {
        let config = MovementConfig::default();
        let mut crouch = CrouchState::new(&config);
        crouch.sliding = true;
        assert_eq!(crouch.desired_height(true), None);
        assert!(!crouch.crouching);

        // Entering a slide while crouched stands the character back up.
        crouch.sliding = false;
        crouch.desired_height(true);
        crouch.sliding = true;
        assert_eq!(crouch.desired_height(true), Some(1.8));
    }

    #[test]
    fn jump_cooldown_releases_after_delay() {
        let mut cooldown = JumpCooldown::default();
        assert!(!cooldown.blocked());

        cooldown.arm(1.0);
        assert!(cooldown.blocked());

        cooldown.tick(Duration::from_millis(500));
        assert!(cooldown.blocked());
        cooldown.tick(Duration::from_millis(600));
        assert!(!cooldown.blocked());
    }
}
