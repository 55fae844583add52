//! Kinematic character controller utilities.
//! A 3D take on avian's proposed move-and-slide API.

pub mod move_and_slide;

/// Re-exports common types related to character controller functionality.
pub mod prelude {
    pub use super::move_and_slide::{MoveAndSlide, MoveAndSlideConfig, MoveAndSlideOutput};
}
