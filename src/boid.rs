/*
 * Boid Module
 *
 * This module defines the Boid struct and its per-tick behaviour.
 * A tick runs in four steps for each boid:
 * 1. Perceive: collect visible neighbours from the quadtree
 * 2. Decide: apply separation, alignment and cohesion in that order
 * 3. Steer: let the boundary override the decision near the world edge
 * 4. Advance: move along the heading
 *
 * Each boid owns a seeded generator so its random choices (initial heading,
 * boundary deviation) are reproducible and independent of other boids.
 */

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::new_key_type;

use crate::boundary::BoundaryPolicy;
use crate::params::{BoidSettings, NeighbourQuery};
use crate::quadtree::QuadTree;
use crate::rules::{self, BoidView};

new_key_type! {
    /// Stable handle for boids backed by a generational slot map.
    pub struct BoidId;
}

// Scratch space for perception, kept alive across boids and ticks
#[derive(Debug, Default)]
pub struct PerceptionBuffer {
    visible: Vec<BoidView>,
    candidates: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Boid {
    position: Vec2,
    heading: Vec2,
    pub settings: BoidSettings,
    boundary_override: bool,
    rng: ChaCha8Rng,
}

impl Boid {
    // Boid at `position` with a random heading drawn from its own seeded generator
    pub fn new(position: Vec2, settings: BoidSettings, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let heading = random_heading(&mut rng);
        Self {
            position,
            heading,
            settings,
            boundary_override: false,
            rng,
        }
    }

    // Boid with a fixed heading; falls back to +X when `heading` has no direction
    pub fn facing(position: Vec2, heading: Vec2, settings: BoidSettings, seed: u64) -> Self {
        Self {
            position,
            heading: heading.try_normalize().unwrap_or(Vec2::X),
            settings,
            boundary_override: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn initialize<R: Rng + ?Sized>(&mut self, position: Vec2, rng: &mut R) {
        self.position = position;
        self.heading = random_heading(rng);
        self.boundary_override = false;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn heading(&self) -> Vec2 {
        self.heading
    }

    // True when the last tick steered back from the edge instead of flocking
    pub fn boundary_override(&self) -> bool {
        self.boundary_override
    }

    pub fn view(&self) -> BoidView {
        BoidView {
            position: self.position,
            heading: self.heading,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.heading.is_finite()
    }

    // Whether `other` is inside the detection radius and the vision cone
    pub fn sees(&self, other: &BoidView) -> bool {
        let offset = other.position - self.position;
        if offset.length() > self.settings.detection_radius {
            return false;
        }

        let facing = self.heading.normalize_or_zero();
        facing.dot(offset.normalize_or_zero()) >= self.settings.vision_threshold()
    }

    // Visible neighbours. `me` is this boid's item in the index and `flock`
    // is the frozen state of every indexed boid for the current tick.
    pub fn perceive(
        &self,
        me: usize,
        index: &QuadTree<usize>,
        flock: &[BoidView],
        query: NeighbourQuery,
    ) -> Vec<BoidView> {
        let mut buffer = PerceptionBuffer::default();
        self.perceive_into(me, index, flock, query, &mut buffer);
        buffer.visible
    }

    // Same as `perceive`, reusing the caller's buffer across boids
    pub fn perceive_into<'a>(
        &self,
        me: usize,
        index: &QuadTree<usize>,
        flock: &[BoidView],
        query: NeighbourQuery,
        buffer: &'a mut PerceptionBuffer,
    ) -> &'a [BoidView] {
        let PerceptionBuffer { visible, candidates } = buffer;
        visible.clear();

        let mut consider = |other: usize| {
            if other == me {
                return;
            }
            if let Some(view) = flock.get(other) {
                if self.sees(view) {
                    visible.push(*view);
                }
            }
        };

        match query {
            NeighbourQuery::Leaf => {
                for &other in index.get_neighbours(self.position) {
                    consider(other);
                }
            }
            NeighbourQuery::Radius => {
                candidates.clear();
                index.query_radius(self.position, self.settings.detection_radius, candidates);
                for &other in candidates.iter() {
                    consider(other);
                }
            }
        }

        visible
    }

    // Flocking heading for this tick, each enabled rule refining the previous result
    pub fn decide(&self, neighbours: &[BoidView]) -> Vec2 {
        let settings = &self.settings;
        let position = self.position;
        let mut heading = self.heading;

        if settings.separation.enabled {
            heading = rules::separation(
                heading,
                position,
                neighbours,
                settings.separation_radius,
                settings.separation.strength,
                settings.separation_weighting,
            );
        }

        if settings.alignment.enabled {
            heading = rules::alignment(
                heading,
                position,
                neighbours,
                settings.alignment_radius,
                settings.alignment.strength,
            );
        }

        if settings.cohesion.enabled {
            heading = rules::cohesion(
                heading,
                position,
                neighbours,
                settings.cohesion_radius,
                settings.cohesion.strength,
            );
        }

        heading
    }

    // Commit this tick's heading. The boundary has priority over flocking.
    pub fn steer(&mut self, neighbours: &[BoidView], boundary: &BoundaryPolicy) {
        match boundary.override_heading(self.position, self.heading, &mut self.rng) {
            Some(heading) => {
                self.heading = heading;
                self.boundary_override = true;
            }
            None => {
                self.heading = self.decide(neighbours);
                self.boundary_override = false;
            }
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.position += self.heading * self.settings.move_speed * dt;
    }
}

// Uniform direction: sample inside the unit disc, then normalize
pub fn random_heading<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    loop {
        let candidate = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        let length_squared = candidate.length_squared();
        if length_squared > 1e-6 && length_squared <= 1.0 {
            return candidate / length_squared.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadtree::Rect;

    const EPS: f32 = 1e-5;

    fn boid_at(x: f32, y: f32, hx: f32, hy: f32) -> Boid {
        Boid::facing(Vec2::new(x, y), Vec2::new(hx, hy), BoidSettings::default(), 1)
    }

    fn index_of(boids: &[Boid]) -> (QuadTree<usize>, Vec<BoidView>) {
        let mut index = QuadTree::new(Rect::centered(100.0, 100.0), 16).unwrap();
        for (i, boid) in boids.iter().enumerate() {
            index.add(i, boid.position());
        }
        (index, boids.iter().map(Boid::view).collect())
    }

    #[test]
    fn new_boids_get_a_unit_heading_from_their_seed() {
        let a = Boid::new(Vec2::ZERO, BoidSettings::default(), 11);
        let b = Boid::new(Vec2::ZERO, BoidSettings::default(), 11);
        let c = Boid::new(Vec2::ZERO, BoidSettings::default(), 12);
        assert!((a.heading().length() - 1.0).abs() < EPS);
        assert_eq!(a.heading(), b.heading());
        assert_ne!(a.heading(), c.heading());
    }

    #[test]
    fn initialize_sets_position_and_random_heading() {
        let mut boid = boid_at(0.0, 0.0, 1.0, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        boid.initialize(Vec2::new(2.0, -3.0), &mut rng);
        assert_eq!(boid.position(), Vec2::new(2.0, -3.0));
        assert!((boid.heading().length() - 1.0).abs() < EPS);
    }

    #[test]
    fn facing_normalizes_and_guards_zero() {
        assert_eq!(boid_at(0.0, 0.0, 3.0, 0.0).heading(), Vec2::X);
        assert_eq!(boid_at(0.0, 0.0, 0.0, 0.0).heading(), Vec2::X);
    }

    #[test]
    fn vision_cone_hides_boids_behind() {
        let boid = boid_at(0.0, 0.0, 1.0, 0.0);
        let ahead = BoidView { position: Vec2::new(2.0, 0.5), heading: Vec2::X };
        let behind = BoidView { position: Vec2::new(-2.0, 0.5), heading: Vec2::X };
        let side = BoidView { position: Vec2::new(0.0, 2.0), heading: Vec2::X };
        let far = BoidView { position: Vec2::new(6.0, 0.0), heading: Vec2::X };
        assert!(boid.sees(&ahead));
        assert!(!boid.sees(&behind));
        // Default cone is 180 degrees: exactly sideways sits on the edge
        assert!(boid.sees(&side));
        assert!(!boid.sees(&far));
    }

    #[test]
    fn narrow_cone_rejects_wide_angles() {
        let mut boid = boid_at(0.0, 0.0, 1.0, 0.0);
        boid.settings.vision_angle = 90.0;
        let inside = BoidView { position: Vec2::new(2.0, 1.0), heading: Vec2::X };
        let outside = BoidView { position: Vec2::new(1.0, 2.0), heading: Vec2::X };
        assert!(boid.sees(&inside));
        assert!(!boid.sees(&outside));
    }

    #[test]
    fn perceive_skips_self_and_filters_by_cone() {
        let boids = vec![
            boid_at(0.0, 0.0, 1.0, 0.0),
            boid_at(1.0, 0.0, 0.0, 1.0),
            boid_at(-1.0, 0.0, 0.0, 1.0),
            boid_at(30.0, 0.0, 0.0, 1.0),
        ];
        let (index, flock) = index_of(&boids);
        for query in [NeighbourQuery::Leaf, NeighbourQuery::Radius] {
            let seen = boids[0].perceive(0, &index, &flock, query);
            assert_eq!(seen, vec![flock[1]]);
        }
    }

    #[test]
    fn perceive_into_reuses_the_buffer() {
        let boids = vec![
            boid_at(0.0, 0.0, 1.0, 0.0),
            boid_at(1.0, 0.0, 0.0, 1.0),
            boid_at(2.0, 0.0, -1.0, 0.0),
        ];
        let (index, flock) = index_of(&boids);
        let mut buffer = PerceptionBuffer::default();

        let first = boids[0].perceive_into(0, &index, &flock, NeighbourQuery::Radius, &mut buffer).to_vec();
        assert_eq!(first, vec![flock[1], flock[2]]);

        // Boid 2 faces -X, so it sees both others; stale results must not leak in
        let second = boids[2].perceive_into(2, &index, &flock, NeighbourQuery::Leaf, &mut buffer);
        assert_eq!(second, &[flock[0], flock[1]]);
        assert_eq!(boids[2].perceive(2, &index, &flock, NeighbourQuery::Leaf), second);
    }

    #[test]
    fn decide_without_neighbours_keeps_heading() {
        let boid = boid_at(0.0, 0.0, 0.6, 0.8);
        assert_eq!(boid.decide(&[]), boid.heading());
    }

    #[test]
    fn decide_applies_rules_in_order() {
        let boid = boid_at(0.0, 0.0, 1.0, 0.0);
        let neighbours = [BoidView { position: Vec2::new(1.0, 1.0), heading: Vec2::Y }];

        let s = &boid.settings;
        let mut expected = rules::separation(
            boid.heading(),
            Vec2::ZERO,
            &neighbours,
            s.separation_radius,
            1.0,
            s.separation_weighting,
        );
        expected = rules::alignment(expected, Vec2::ZERO, &neighbours, s.alignment_radius, 1.0);
        expected = rules::cohesion(expected, Vec2::ZERO, &neighbours, s.cohesion_radius, 1.0);

        let decided = boid.decide(&neighbours);
        assert_eq!(decided, expected);
        assert!((decided.length() - 1.0).abs() < EPS);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut boid = boid_at(0.0, 0.0, 1.0, 0.0);
        boid.settings.separation.enabled = false;
        boid.settings.alignment.enabled = false;
        boid.settings.cohesion.enabled = false;
        let neighbours = [BoidView { position: Vec2::new(1.0, 1.0), heading: Vec2::Y }];
        assert_eq!(boid.decide(&neighbours), Vec2::X);
    }

    #[test]
    fn steer_prefers_the_boundary() {
        let policy = BoundaryPolicy::new(40.0, 40.0, 4.0);
        let neighbours = [BoidView { position: Vec2::new(19.5, 1.0), heading: Vec2::Y }];

        let mut edge = boid_at(19.0, 0.0, 1.0, 0.0);
        let flocking = edge.decide(&neighbours);
        edge.steer(&neighbours, &policy);
        assert!(edge.boundary_override());
        assert_ne!(edge.heading(), flocking);

        let mut inner = boid_at(0.0, 0.0, 1.0, 0.0);
        inner.steer(&[], &policy);
        assert!(!inner.boundary_override());
        assert_eq!(inner.heading(), Vec2::X);
    }

    #[test]
    fn advance_moves_along_heading() {
        let mut boid = boid_at(1.0, 1.0, 0.0, 1.0);
        boid.settings.move_speed = 2.0;
        boid.advance(0.5);
        assert_eq!(boid.position(), Vec2::new(1.0, 2.0));
        assert!((boid.heading().length() - 1.0).abs() < EPS);
    }
}
