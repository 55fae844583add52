//! The *move and slide* (a.k.a. *collide and slide*) algorithm for kinematic
//! character controllers.
//!
//! [`MoveAndSlide::move_and_slide`] attempts to move a shape along a desired
//! velocity vector, sliding along any colliders it hits on the way, with
//! depenetration passes to keep the shape out of solid geometry.

use avian3d::math::{AdjustPrecision as _, AsF32 as _, Quaternion, Scalar, Vector};
use avian3d::{collision::collider::contact_query::contact_manifolds, prelude::*};
use bevy::{ecs::system::SystemParam, math::Dir3, prelude::*};
use core::time::Duration;

/// Needed to not accidentally explode when `n.dot(dir)` happens to be very close to zero.
const DOT_EPSILON: Scalar = 0.005;

/// A [`SystemParam`] implementing the move and slide loop:
///
/// 1. Sweep the shape along the velocity vector.
/// 2. If nothing is hit, move the full distance.
/// 3. Otherwise move up to the hit, collect contact planes, depenetrate,
///    and project the remaining velocity onto the contact planes.
/// 4. Repeat with the sliding velocity until out of time or iterations.
#[derive(SystemParam)]
#[doc(alias = "CollideAndSlide")]
pub struct MoveAndSlide<'w, 's> {
    /// The [`SpatialQueryPipeline`] used to perform spatial queries.
    pub query_pipeline: Res<'w, SpatialQueryPipeline>,
    /// The [`Query`] used to query colliders.
    pub colliders: Query<
        'w,
        's,
        (
            &'static Collider,
            &'static Position,
            &'static Rotation,
            Option<&'static CollisionLayers>,
        ),
    >,
    /// A units-per-meter scaling factor that adjusts thresholds and tolerances
    /// to the scale of the world.
    pub length_unit: Res<'w, PhysicsLengthUnit>,
}

impl<'w, 's> MoveAndSlide<'w, 's> {
    #[must_use]
    #[doc(alias = "collide_and_slide")]
    pub fn move_and_slide(
        &self,
        shape: &Collider,
        shape_position: Vector,
        shape_rotation: Quaternion,
        mut velocity: Vector,
        delta_time: Duration,
        config: &MoveAndSlideConfig,
        filter: &SpatialQueryFilter,
    ) -> MoveAndSlideOutput {
        let mut position = shape_position;
        let original_velocity = velocity;
        let mut time_left = delta_time.as_secs_f32();

        // Initial depenetration pass.
        let mut intersections = Vec::new();
        self.intersections(
            shape,
            position,
            shape_rotation,
            config.skin_width,
            filter,
            |contact_point, normal| {
                intersections.push((normal, contact_point.penetration + config.skin_width));
                true
            },
        );
        position += self.depenetrate(config, &intersections);

        'outer: for _ in 0..config.move_and_slide_iterations {
            let sweep = time_left * velocity;
            let Ok((vel_dir, distance)) = Dir3::new_and_length(sweep.f32()) else {
                // No movement left.
                break;
            };
            let distance = distance.adjust_precision();
            const MIN_DISTANCE: Scalar = 1e-4;
            if distance < MIN_DISTANCE {
                break;
            }

            // Sweep the shape along the velocity vector.
            let Some(sweep_hit) =
                self.cast_move(shape, position, shape_rotation, sweep, config.skin_width, filter)
            else {
                // No collision, move the full distance.
                position += sweep;
                break;
            };

            if sweep_hit.intersects() {
                // The shape is completely trapped in another solid.
                velocity = Vector::ZERO;
                break 'outer;
            }

            // Move up to the hit point.
            time_left -= time_left * (sweep_hit.distance / distance);
            position += vel_dir.adjust_precision() * sweep_hit.distance;

            // Collect contact planes for velocity clipping, plus penetrating
            // contacts for depenetration. A slightly larger skin width is used
            // for clipping to make sure no contact is missed.
            let mut planes = config.planes.clone();
            let mut intersections = Vec::new();
            self.intersections(
                shape,
                position,
                shape_rotation,
                config.skin_width * 2.0,
                filter,
                |contact_point, normal| {
                    if planes.len() >= config.max_planes {
                        return false;
                    }
                    planes.push(normal);
                    let total_penetration = contact_point.penetration + config.skin_width;
                    if total_penetration > 0.0 {
                        intersections.push((normal, total_penetration));
                    }
                    true
                },
            );

            position += self.depenetrate(config, &intersections);

            // Project velocity to be parallel to all contact planes.
            velocity = Self::project_velocity(velocity, &planes);

            // If the projection turned against the original velocity, stop dead
            // to avoid tiny oscillations in sloping corners.
            if velocity.dot(original_velocity) <= -DOT_EPSILON {
                velocity = Vector::ZERO;
                break 'outer;
            }
        }

        MoveAndSlideOutput {
            position,
            projected_velocity: velocity,
        }
    }

    /// Sweeps `shape` along `movement` and returns the hit with the safe travel
    /// distance pulled back by `skin_width`, or `None` when the path is clear.
    #[must_use]
    #[doc(alias = "sweep")]
    pub fn cast_move(
        &self,
        shape: &Collider,
        shape_position: Vector,
        shape_rotation: Quaternion,
        movement: Vector,
        skin_width: Scalar,
        filter: &SpatialQueryFilter,
    ) -> Option<MoveHitData> {
        let (direction, distance) = Dir3::new_and_length(movement.f32()).unwrap_or((Dir3::X, 0.0));
        let distance = distance.adjust_precision();
        let shape_hit = self.query_pipeline.cast_shape(
            shape,
            shape_position,
            shape_rotation,
            direction,
            &ShapeCastConfig::from_max_distance(distance),
            filter,
        )?;
        let safe_distance = if distance == 0.0 {
            0.0
        } else {
            Self::pull_back(shape_hit, direction, skin_width)
        };
        Some(MoveHitData {
            distance: safe_distance,
            collision_distance: shape_hit.distance,
            entity: shape_hit.entity,
            point: shape_hit.point1,
            normal: shape_hit.normal1,
        })
    }

    /// Reduces a [`ShapeHitData::distance`] such that the shape keeps at least
    /// `skin_width` to the hit collider. Never negative.
    #[must_use]
    fn pull_back(hit: ShapeHitData, dir: Dir3, skin_width: Scalar) -> Scalar {
        let dot = dir.adjust_precision().dot(-hit.normal1).max(DOT_EPSILON);
        let skin_distance = skin_width / dot;
        (hit.distance - skin_distance).max(0.0)
    }

    /// An intersection test that calls `callback` for each collider closer to
    /// `shape` than `prediction_distance`, with the deepest contact point and
    /// the contact normal.
    pub fn intersections(
        &self,
        shape: &Collider,
        shape_position: Vector,
        shape_rotation: Quaternion,
        prediction_distance: Scalar,
        filter: &SpatialQueryFilter,
        mut callback: impl FnMut(&ContactPoint, Dir3) -> bool,
    ) {
        let expanded_aabb = shape
            .aabb(shape_position, shape_rotation)
            .grow(Vector::splat(prediction_distance));
        let aabb_intersections = self
            .query_pipeline
            .aabb_intersections_with_aabb(expanded_aabb);
        for intersection_entity in aabb_intersections {
            let Ok((intersection_collider, intersection_pos, intersection_rot, layers)) =
                self.colliders.get(intersection_entity)
            else {
                continue;
            };
            let layers = layers.copied().unwrap_or_default();
            if !filter.test(intersection_entity, layers) {
                continue;
            }
            let mut manifolds = Vec::new();
            contact_manifolds(
                shape,
                shape_position,
                shape_rotation,
                intersection_collider,
                *intersection_pos,
                *intersection_rot,
                prediction_distance,
                &mut manifolds,
            );
            for manifold in manifolds {
                let Some(deepest) = manifold.find_deepest_contact() else {
                    continue;
                };

                let normal = Dir3::new_unchecked(-manifold.normal.f32());
                if !callback(deepest, normal) {
                    return;
                }
            }
        }
    }

    /// Resolves a set of `(contact normal, penetration)` pairs into a single
    /// displacement that pushes the shape out of all of them, solving
    /// iteratively until the accumulated error is below the configured
    /// threshold or iterations run out.
    #[must_use]
    pub fn depenetrate(
        &self,
        config: &MoveAndSlideConfig,
        intersections: &[(Dir3, Scalar)],
    ) -> Vector {
        if intersections.is_empty() {
            return Vector::ZERO;
        }

        let mut fixup = Vector::ZERO;
        for _ in 0..config.depenetration_iterations {
            let mut total_error = 0.0;
            for (normal, dist) in intersections {
                if *dist > self.length_unit.0 * config.penetration_rejection_threshold {
                    continue;
                }
                let normal = normal.adjust_precision();
                let error = (dist - fixup.dot(normal)).max(0.0);
                total_error += error;
                fixup += error * normal;
            }
            if total_error < self.length_unit.0 * config.max_depenetration_error {
                break;
            }
        }
        fixup
    }

    /// Projects `v` onto the convex cone defined by the contact `normals`,
    /// so that the result does not point into any of the planes.
    ///
    /// The result carries some numerical error, so re-assert invariants such as
    /// `velocity.y = 0.0` after calling this on a ground plane.
    pub fn project_velocity(v: Vector, normals: &[Dir3]) -> Vector {
        // Already inside the cone?
        if normals
            .iter()
            .all(|n| v.dot(n.adjust_precision()) >= -DOT_EPSILON)
        {
            return v;
        }

        let mut best_projection = Vector::ZERO;
        let mut best_distance_sq = Scalar::INFINITY;

        let is_valid = |projection: Vector| {
            normals
                .iter()
                .all(|n| projection.dot(n.adjust_precision()) >= -DOT_EPSILON)
        };

        // Single-plane face projections.
        for n in normals {
            let n = n.adjust_precision();
            let v_dot_n = v.dot(n);
            if v_dot_n < 0.0 {
                let projection = v - v_dot_n * n;
                let distance_sq = v.distance_squared(projection);
                if distance_sq < best_distance_sq && is_valid(projection) {
                    best_distance_sq = distance_sq;
                    best_projection = projection;
                }
            }
        }

        // Two-plane crease projections: slide along the intersection line.
        for (i, a) in normals.iter().enumerate() {
            for b in &normals[i + 1..] {
                let crease = a.adjust_precision().cross(b.adjust_precision());
                if crease.length_squared() <= DOT_EPSILON * DOT_EPSILON {
                    continue;
                }
                let crease = crease.normalize();
                let projection = v.project_onto_normalized(crease);
                let distance_sq = v.distance_squared(projection);
                if distance_sq < best_distance_sq && is_valid(projection) {
                    best_distance_sq = distance_sq;
                    best_projection = projection;
                }
            }
        }

        // No candidate found: the projection is at the apex of the cone.
        if best_distance_sq.is_infinite() {
            Vector::ZERO
        } else {
            best_projection
        }
    }
}

/// Data related to a hit during a [`MoveAndSlide::cast_move`].
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct MoveHitData {
    /// The entity of the collider that was hit by the shape.
    pub entity: Entity,

    /// The maximum distance that is safe to move in the given direction so
    /// that the shape still keeps `skin_width` to the hit collider.
    /// Zero when the shape started off intersecting, or is already closer
    /// than `skin_width`.
    pub distance: Scalar,

    /// The hit point on the collider that was hit, in world space.
    pub point: Vector,

    /// The outward surface normal on the hit collider at `point`.
    pub normal: Vector,

    /// The raw distance to the next collision, not respecting skin width.
    /// To move the shape, use [`Self::distance`] instead.
    #[doc(alias = "time_of_impact")]
    pub collision_distance: Scalar,
}

impl MoveHitData {
    /// Whether the shape started off already intersecting another collider.
    pub fn intersects(self) -> bool {
        self.collision_distance == 0.0
    }
}

/// Configuration for [`MoveAndSlide::move_and_slide`].
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct MoveAndSlideConfig {
    /// How many sweep-depenetrate-project iterations to run per move.
    pub move_and_slide_iterations: usize,

    /// How many iterations to use when resolving penetrations.
    pub depenetration_iterations: usize,

    /// The target accumulated error when resolving penetrations,
    /// implicitly scaled by the [`PhysicsLengthUnit`].
    pub max_depenetration_error: Scalar,

    /// Contacts deeper than this are rejected during depenetration to avoid
    /// clipping through geometry on bad manifolds.
    /// Implicitly scaled by the [`PhysicsLengthUnit`].
    pub penetration_rejection_threshold: Scalar,

    /// A minimal distance to always keep between the shape and other
    /// colliders, so that numeric errors never leave the shape intersecting.
    pub skin_width: Scalar,

    /// Initial planes the move may never push into. Useful for pinning the
    /// ground plane while walking.
    pub planes: Vec<Dir3>,

    /// Abort the move and zero the velocity if this many contact planes
    /// accumulate. Practically unreachable outside exotic geometry.
    pub max_planes: usize,
}

impl Default for MoveAndSlideConfig {
    fn default() -> Self {
        Self {
            move_and_slide_iterations: 4,
            depenetration_iterations: 16,
            max_depenetration_error: 0.0001,
            penetration_rejection_threshold: 0.5,
            skin_width: 0.01,
            planes: Vec::new(),
            max_planes: 20,
        }
    }
}

/// Output from a [`MoveAndSlide::move_and_slide`].
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct MoveAndSlideOutput {
    /// The final position of the character. Set [`Transform::translation`] to this.
    pub position: Vector,

    /// The actual velocity after sliding, as opposed to the wished velocity.
    /// Against a ramp this points up the ramp. Do *not* feed this to
    /// [`LinearVelocity`], that would apply the movement twice.
    pub projected_velocity: Vector,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(x: f32, y: f32, z: f32) -> Dir3 {
        Dir3::new(Vec3::new(x, y, z)).unwrap()
    }

    #[test]
    fn project_velocity_no_planes_is_identity() {
        let v = Vec3::new(1.0, -2.0, 3.0);
        assert_eq!(MoveAndSlide::project_velocity(v, &[]), v);
    }

    #[test]
    fn project_velocity_removes_into_plane_component() {
        let v = Vec3::new(1.0, -1.0, 0.0);
        let projected = MoveAndSlide::project_velocity(v, &[dir(0.0, 1.0, 0.0)]);
        assert!(projected.y.abs() < 1e-6);
        assert!((projected.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn project_velocity_keeps_velocity_inside_cone() {
        let v = Vec3::new(1.0, 1.0, 0.0);
        let projected = MoveAndSlide::project_velocity(v, &[dir(0.0, 1.0, 0.0)]);
        assert_eq!(projected, v);
    }

    #[test]
    fn project_velocity_corner_slides_along_crease() {
        // Pushing diagonally into two perpendicular walls should slide along
        // their shared edge (here, the Y axis) or stop, never point into either.
        let v = Vec3::new(1.0, -1.0, 1.0);
        let normals = [dir(-1.0, 0.0, 0.0), dir(0.0, 0.0, -1.0)];
        let projected = MoveAndSlide::project_velocity(v, &normals);
        for n in normals {
            assert!(projected.dot(n.as_vec3()) >= -DOT_EPSILON);
        }
    }

    #[test]
    fn project_velocity_opposing_planes_stop_dead() {
        let v = Vec3::new(0.0, -1.0, 0.0);
        let normals = [dir(0.0, 1.0, 0.0), dir(0.0, -1.0, 0.0)];
        let projected = MoveAndSlide::project_velocity(v, &normals);
        assert!(projected.length() < 1e-6);
    }
}
