/*
 * Flocking Rules Module
 *
 * Stateless steering functions. Each rule takes the current heading and a
 * neighbour set and returns a refined heading:
 * 1. Separation: turn away from neighbours that are too close, weighted either
 *    by raw offset (Linear) or by closeness (Proximity)
 * 2. Alignment: turn towards the average heading of neighbours
 * 3. Cohesion: turn towards the average position of neighbours
 *
 * Every rule finishes through `blend`, which moves the heading a fixed fraction
 * towards the rule's target and renormalizes. A zero-length target or result
 * leaves the heading untouched instead of producing NaN.
 */

use glam::Vec2;

use crate::params::SeparationWeighting;
use crate::BLEND_FACTOR;

// What one boid knows about another during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoidView {
    pub position: Vec2,
    pub heading: Vec2,
}

// Move `heading` BLEND_FACTOR of the way towards normalize(target)
#[inline]
pub fn blend(heading: Vec2, target: Vec2) -> Vec2 {
    let Some(target) = target.try_normalize() else {
        return heading;
    };
    heading
        .lerp(target, BLEND_FACTOR)
        .try_normalize()
        .unwrap_or(heading)
}

// Raw push away from neighbours inside `radius`, weighted per `weighting`
pub fn separation_push(
    position: Vec2,
    neighbours: &[BoidView],
    radius: f32,
    strength: f32,
    weighting: SeparationWeighting,
) -> Vec2 {
    let mut push = Vec2::ZERO;

    for other in neighbours {
        let offset = other.position - position;
        let distance = offset.length();

        // Co-located neighbours give no direction to flee in
        if distance > 0.0 && distance <= radius {
            let rate = (distance / radius).clamp(0.0, 1.0);
            push -= match weighting {
                SeparationWeighting::Linear => rate * offset,
                SeparationWeighting::Proximity => (1.0 - rate) * (offset / distance),
            } * strength;
        }
    }

    push
}

pub fn separation(
    heading: Vec2,
    position: Vec2,
    neighbours: &[BoidView],
    radius: f32,
    strength: f32,
    weighting: SeparationWeighting,
) -> Vec2 {
    let push = separation_push(position, neighbours, radius, strength, weighting);
    if push == Vec2::ZERO {
        return heading;
    }
    blend(heading, heading + push)
}

pub fn alignment(heading: Vec2, position: Vec2, neighbours: &[BoidView], radius: f32, strength: f32) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0;

    for other in neighbours {
        if position.distance(other.position) <= radius {
            sum += other.heading;
            count += 1;
        }
    }

    if count == 0 {
        return heading;
    }

    let average = sum / count as f32 * strength;
    blend(heading, heading + average)
}

pub fn cohesion(heading: Vec2, position: Vec2, neighbours: &[BoidView], radius: f32, strength: f32) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0;

    for other in neighbours {
        if position.distance(other.position) <= radius {
            sum += other.position;
            count += 1;
        }
    }

    if count == 0 {
        return heading;
    }

    let center = sum / count as f32;
    let Some(to_center) = (center - position).try_normalize() else {
        return heading;
    };
    blend(heading, heading + to_center * strength)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn view(x: f32, y: f32, hx: f32, hy: f32) -> BoidView {
        BoidView {
            position: Vec2::new(x, y),
            heading: Vec2::new(hx, hy),
        }
    }

    #[test]
    fn blend_moves_a_tenth_of_the_way_and_renormalizes() {
        let heading = Vec2::X;
        let result = blend(heading, Vec2::Y * 5.0);
        let expected = Vec2::new(0.9, 0.1).normalize();
        assert!((result - expected).length() < EPS);
        assert!((result.length() - 1.0).abs() < EPS);
    }

    #[test]
    fn blend_keeps_heading_for_zero_target() {
        let heading = Vec2::new(0.6, 0.8);
        assert_eq!(blend(heading, Vec2::ZERO), heading);
    }

    #[test]
    fn blend_of_zero_vectors_stays_zero() {
        assert_eq!(blend(Vec2::ZERO, Vec2::ZERO), Vec2::ZERO);
    }

    #[test]
    fn rules_are_no_ops_without_neighbours() {
        let heading = Vec2::new(0.6, -0.8);
        let position = Vec2::new(3.0, 4.0);
        assert_eq!(separation(heading, position, &[], 2.0, 1.0, SeparationWeighting::Linear), heading);
        assert_eq!(alignment(heading, position, &[], 4.0, 1.0), heading);
        assert_eq!(cohesion(heading, position, &[], 4.0, 1.0), heading);
    }

    #[test]
    fn rules_ignore_neighbours_outside_their_radius() {
        let heading = Vec2::X;
        let far = [view(10.0, 0.0, 0.0, 1.0)];
        assert_eq!(separation(heading, Vec2::ZERO, &far, 2.0, 1.0, SeparationWeighting::Linear), heading);
        assert_eq!(alignment(heading, Vec2::ZERO, &far, 4.0, 1.0), heading);
        assert_eq!(cohesion(heading, Vec2::ZERO, &far, 4.0, 1.0), heading);
    }

    #[test]
    fn separation_turns_away() {
        // Neighbour ahead and to the left: heading should swing right (negative y)
        let heading = Vec2::X;
        let neighbours = [view(1.0, 0.5, 1.0, 0.0)];
        for weighting in [SeparationWeighting::Linear, SeparationWeighting::Proximity] {
            let result = separation(heading, Vec2::ZERO, &neighbours, 2.0, 1.0, weighting);
            assert!(result.y < 0.0, "{weighting:?}");
            assert!((result.length() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn linear_separation_scales_raw_offset_by_distance_ratio() {
        // d = 1.8, R = 2: rate 0.9 times the offset (1.8, 0)
        let neighbours = [view(1.8, 0.0, 1.0, 0.0)];
        let push = separation_push(Vec2::ZERO, &neighbours, 2.0, 1.0, SeparationWeighting::Linear);
        assert!((push - Vec2::new(-1.62, 0.0)).length() < EPS);

        let doubled = separation_push(Vec2::ZERO, &neighbours, 2.0, 2.0, SeparationWeighting::Linear);
        assert!((doubled - Vec2::new(-3.24, 0.0)).length() < EPS);

        let heading = separation(Vec2::Y, Vec2::ZERO, &neighbours, 2.0, 1.0, SeparationWeighting::Linear);
        let expected = Vec2::Y.lerp(Vec2::new(-1.62, 1.0).normalize(), 0.1).normalize();
        assert!((heading - expected).length() < EPS);
    }

    #[test]
    fn proximity_separation_falls_off_towards_the_radius() {
        let neighbours = [view(1.8, 0.0, 1.0, 0.0)];
        let push = separation_push(Vec2::ZERO, &neighbours, 2.0, 1.0, SeparationWeighting::Proximity);
        assert!((push - Vec2::new(-0.1, 0.0)).length() < EPS);
    }

    #[test]
    fn separation_grows_as_distance_shrinks() {
        let radius = 2.0;
        let mut previous = 0.0;
        for step in (1..20).rev() {
            let distance = radius * step as f32 / 20.0;
            let neighbours = [view(distance, 0.0, 1.0, 0.0)];
            let push = separation_push(Vec2::ZERO, &neighbours, radius, 1.0, SeparationWeighting::Proximity);
            let magnitude = push.length();
            assert!(magnitude > previous, "distance {distance}: {magnitude} <= {previous}");
            previous = magnitude;
        }
    }

    #[test]
    fn separation_ignores_co_located_neighbours() {
        for weighting in [SeparationWeighting::Linear, SeparationWeighting::Proximity] {
            let push = separation_push(Vec2::ONE, &[view(1.0, 1.0, 0.0, 1.0)], 2.0, 1.0, weighting);
            assert_eq!(push, Vec2::ZERO);
        }
    }

    #[test]
    fn alignment_turns_towards_average_heading() {
        let heading = Vec2::X;
        let neighbours = [view(1.0, 0.0, 0.0, 1.0), view(0.0, 1.0, 0.0, 1.0)];
        let result = alignment(heading, Vec2::ZERO, &neighbours, 4.0, 1.0);
        let expected = blend(heading, Vec2::new(1.0, 1.0));
        assert!((result - expected).length() < EPS);
        assert!(result.y > 0.0);
    }

    #[test]
    fn alignment_keeps_heading_when_average_cancels_it() {
        let heading = Vec2::X;
        let result = alignment(heading, Vec2::ZERO, &[view(1.0, 0.0, -1.0, 0.0)], 4.0, 1.0);
        assert_eq!(result, heading);
    }

    #[test]
    fn cohesion_turns_towards_centroid() {
        let heading = Vec2::X;
        let neighbours = [view(0.0, 2.0, 1.0, 0.0), view(2.0, 2.0, 1.0, 0.0)];
        let result = cohesion(heading, Vec2::ZERO, &neighbours, 4.0, 1.0);
        let to_center = Vec2::new(1.0, 2.0).normalize();
        let expected = blend(heading, heading + to_center);
        assert!((result - expected).length() < EPS);
    }

    #[test]
    fn cohesion_skips_when_centroid_is_self() {
        let heading = Vec2::Y;
        let neighbours = [view(-1.0, 0.0, 1.0, 0.0), view(1.0, 0.0, 1.0, 0.0)];
        assert_eq!(cohesion(heading, Vec2::ZERO, &neighbours, 4.0, 1.0), heading);
    }

    #[test]
    fn strength_scales_the_contribution() {
        let heading = Vec2::X;
        let neighbours = [view(0.0, 1.0, 0.0, 1.0)];
        let weak = alignment(heading, Vec2::ZERO, &neighbours, 4.0, 0.5);
        let strong = alignment(heading, Vec2::ZERO, &neighbours, 4.0, 2.0);
        assert!(strong.y > weak.y);
    }
}
