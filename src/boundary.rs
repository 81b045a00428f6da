/*
 * Boundary Module
 *
 * Keeps boids inside the world. A boid past the inset margin on either axis is
 * turned back towards the world centre with a random deviation, and that turn
 * replaces flocking for the tick.
 */

use glam::Vec2;
use rand::Rng;

use crate::quadtree::Rect;
use crate::{BLEND_FACTOR, BOUNDARY_JITTER_DEGREES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryPolicy {
    half_extents: Vec2,
    inset: f32,
}

impl BoundaryPolicy {
    pub fn new(width: f32, height: f32, inset: f32) -> Self {
        Self {
            half_extents: Vec2::new(width, height) * 0.5,
            inset,
        }
    }

    pub fn from_bounds(bounds: Rect, inset: f32) -> Self {
        let size = bounds.size();
        Self::new(size.x, size.y, inset)
    }

    // Distance from the centre along each axis at which the override kicks in
    pub fn threshold(&self) -> Vec2 {
        self.half_extents - Vec2::splat(self.inset)
    }

    pub fn is_outside(&self, position: Vec2) -> bool {
        let threshold = self.threshold();
        position.x.abs() > threshold.x || position.y.abs() > threshold.y
    }

    // Heading to use instead of flocking, or None while the boid is inside
    pub fn override_heading<R: Rng + ?Sized>(&self, position: Vec2, heading: Vec2, rng: &mut R) -> Option<Vec2> {
        if !self.is_outside(position) {
            return None;
        }

        let jitter = rng
            .gen_range(-BOUNDARY_JITTER_DEGREES..=BOUNDARY_JITTER_DEGREES)
            .to_radians();

        let Some(to_center) = (-position).try_normalize() else {
            return Some(heading);
        };
        let direction = Vec2::from_angle(jitter).rotate(to_center);

        Some(
            heading
                .lerp(direction, BLEND_FACTOR)
                .try_normalize()
                .unwrap_or(heading),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn threshold_is_half_extent_minus_inset() {
        let policy = BoundaryPolicy::new(40.0, 40.0, 4.0);
        assert_eq!(policy.threshold(), Vec2::splat(16.0));
        assert!(!policy.is_outside(Vec2::new(16.0, -16.0)));
        assert!(policy.is_outside(Vec2::new(16.01, 0.0)));
        assert!(policy.is_outside(Vec2::new(0.0, -17.0)));
    }

    #[test]
    fn inside_boids_are_left_alone() {
        let policy = BoundaryPolicy::new(40.0, 40.0, 4.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(policy.override_heading(Vec2::new(5.0, 5.0), Vec2::X, &mut rng), None);
    }

    #[test]
    fn edge_boid_turns_back_towards_center() {
        let policy = BoundaryPolicy::new(40.0, 40.0, 4.0);
        let position = Vec2::new(19.0, 0.0);
        let heading = Vec2::X;

        for seed in 0..64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = policy.override_heading(position, heading, &mut rng).unwrap();

            assert!((result.length() - 1.0).abs() < 1e-5);
            assert!((result - heading).length() <= 0.1 + 1e-6);

            // Result is the 10% blend towards a centre-facing direction within 45 degrees
            let mut replay = ChaCha8Rng::seed_from_u64(seed);
            let jitter: f32 = replay.gen_range(-45.0f32..=45.0).to_radians();
            assert!(jitter.abs() <= std::f32::consts::FRAC_PI_4 + 1e-6);
            let direction = Vec2::from_angle(jitter).rotate(Vec2::NEG_X);
            let expected = heading.lerp(direction, 0.1).normalize();
            assert!((result - expected).length() < 1e-5);
        }
    }

    #[test]
    fn center_position_keeps_heading() {
        // A degenerate inset puts even the centre outside
        let policy = BoundaryPolicy::new(4.0, 4.0, 3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let heading = Vec2::new(0.6, 0.8);
        assert_eq!(policy.override_heading(Vec2::ZERO, heading, &mut rng), Some(heading));
    }
}
