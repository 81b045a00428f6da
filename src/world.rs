/*
 * World Module
 *
 * The World owns the boid population and runs the simulation one fixed tick
 * at a time. A tick has two strict phases:
 * 1. Rebuild: reset the quadtree and insert every boid at its current position
 * 2. Steer, then move: every boid perceives and decides against a frozen
 *    snapshot of the flock, and only after all of them have decided does any
 *    boid move
 *
 * Because deciding reads only the snapshot and the index, and each boid writes
 * only its own state, both halves of phase 2 can run in parallel with rayon
 * and produce exactly the same result as the sequential path.
 *
 * Boids live in a dense vector for iteration; a slot map hands out
 * generational handles so stale handles are detected instead of aliasing a
 * newer boid.
 */

use std::time::Instant;

use glam::Vec2;
use rayon::prelude::*;
use slotmap::SlotMap;
use tracing::{debug, info, trace, warn};

use crate::boid::{Boid, BoidId, PerceptionBuffer};
use crate::boundary::BoundaryPolicy;
use crate::debug::{StepOutcome, TickStats};
use crate::error::{FlockError, Result};
use crate::params::{BoidSettings, SimulationParams};
use crate::quadtree::{QuadTree, Rect};
use crate::rules::BoidView;
use crate::SEED_DERIVATION_PRIME;

pub struct World {
    params: SimulationParams,
    bounds: Rect,
    boundary: BoundaryPolicy,
    slots: SlotMap<BoidId, usize>,
    handles: Vec<BoidId>,
    boids: Vec<Boid>,
    index: QuadTree<usize>,
    snapshot: Vec<BoidView>,
    perception: PerceptionBuffer,
    spawned: u64,
    tick: u64,
    last_tick: TickStats,
}

impl World {
    // World of `width` x `height` centred on the origin, default settings otherwise
    pub fn create(width: f32, height: f32, leaf_capacity: usize) -> Result<Self> {
        Self::new(SimulationParams::with_bounds(width, height, leaf_capacity))
    }

    pub fn new(params: SimulationParams) -> Result<Self> {
        params.validate()?;

        let bounds = Rect::centered(params.world_width, params.world_height);
        let boundary = BoundaryPolicy::from_bounds(bounds, params.boundary_inset);
        let index = QuadTree::new(bounds, params.leaf_capacity)?;

        info!(
            width = params.world_width,
            height = params.world_height,
            leaf_capacity = params.leaf_capacity,
            parallel = params.enable_parallel,
            query = ?params.neighbour_query,
            "created world"
        );

        Ok(Self {
            params,
            bounds,
            boundary,
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            boids: Vec::new(),
            index,
            snapshot: Vec::new(),
            perception: PerceptionBuffer::default(),
            spawned: 0,
            tick: 0,
            last_tick: TickStats::default(),
        })
    }

    // Spawn with the world's default boid settings. Without a seed, the boid's
    // generator is derived from the world seed and the spawn count.
    pub fn spawn(&mut self, position: Vec2, heading_seed: Option<u64>) -> BoidId {
        let settings = self.params.boid;
        let seed = heading_seed.unwrap_or_else(|| self.next_seed());
        self.push(Boid::new(position, settings, seed))
    }

    pub fn spawn_with(
        &mut self,
        position: Vec2,
        settings: BoidSettings,
        heading_seed: Option<u64>,
    ) -> Result<BoidId> {
        settings.validate()?;
        let seed = heading_seed.unwrap_or_else(|| self.next_seed());
        Ok(self.push(Boid::new(position, settings, seed)))
    }

    // Hand over a boid built by the caller
    pub fn insert(&mut self, boid: Boid) -> Result<BoidId> {
        boid.settings.validate()?;
        Ok(self.push(boid))
    }

    fn next_seed(&mut self) -> u64 {
        let serial = self.spawned;
        self.spawned += 1;
        self.params
            .seed
            .wrapping_add(serial.wrapping_add(1).wrapping_mul(SEED_DERIVATION_PRIME))
    }

    fn push(&mut self, boid: Boid) -> BoidId {
        let index = self.boids.len();
        self.boids.push(boid);
        let id = self.slots.insert(index);
        self.handles.push(id);
        debug!(?id, count = self.boids.len(), "spawned boid");
        id
    }

    pub fn remove(&mut self, id: BoidId) -> Result<Boid> {
        let index = self
            .slots
            .remove(id)
            .ok_or(FlockError::InvalidAgentReference(id))?;

        let removed = self.boids.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);

        // The last boid moved into the freed slot
        if let Some(&moved) = self.handles.get(index) {
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }

        debug!(?id, count = self.boids.len(), "removed boid");
        Ok(removed)
    }

    pub fn boid(&self, id: BoidId) -> Result<&Boid> {
        self.slots
            .get(id)
            .map(|&index| &self.boids[index])
            .ok_or(FlockError::InvalidAgentReference(id))
    }

    pub fn set_settings(&mut self, id: BoidId, settings: BoidSettings) -> Result<()> {
        settings.validate()?;
        let index = *self
            .slots
            .get(id)
            .ok_or(FlockError::InvalidAgentReference(id))?;
        self.boids[index].settings = settings;
        Ok(())
    }

    pub fn contains(&self, id: BoidId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn agent_count(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BoidId, &Boid)> + '_ {
        self.handles.iter().copied().zip(self.boids.iter())
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn boundary(&self) -> &BoundaryPolicy {
        &self.boundary
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    // Index built during the last tick (items are dense positions in `iter()` order)
    pub fn index(&self) -> &QuadTree<usize> {
        &self.index
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn last_tick(&self) -> &TickStats {
        &self.last_tick
    }

    // Switch between rayon and the sequential path; results are identical
    pub fn set_parallel(&mut self, enabled: bool) {
        self.params.enable_parallel = enabled;
    }

    // Advance the simulation by one tick of length `dt`
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() {
            warn!(dt, "ignoring tick with non-finite timestep");
            return;
        }

        let started = Instant::now();
        let mut stats = TickStats {
            tick: self.tick,
            boids: self.boids.len(),
            ..TickStats::default()
        };

        // Phase 1: rebuild the index from a snapshot of current positions
        self.rebuild_index();
        stats.indexed = self.index.len();
        stats.leaf_count = self.index.leaf_count();
        stats.tree_depth = self.index.depth();

        // Phase 2a: perceive and decide against the frozen snapshot
        let index = &self.index;
        let flock = &self.snapshot;
        let boundary = &self.boundary;
        let query = self.params.neighbour_query;
        let tick = self.tick;

        let steer = |buffer: &mut PerceptionBuffer, (me, boid): (usize, &mut Boid)| -> StepOutcome {
            if !boid.is_finite() {
                warn!(tick, boid = me, position = ?boid.position(), heading = ?boid.heading(), "skipping boid with non-finite state");
                return StepOutcome::Skipped;
            }
            let neighbours = boid.perceive_into(me, index, flock, query, buffer);
            boid.steer(neighbours, boundary);
            StepOutcome::Steered {
                neighbours: neighbours.len(),
                overridden: boid.boundary_override(),
            }
        };

        // One perception buffer per rayon job, or the world's own when sequential
        let outcomes: Vec<StepOutcome> = if self.params.enable_parallel {
            self.boids
                .par_iter_mut()
                .enumerate()
                .map_init(PerceptionBuffer::default, steer)
                .collect()
        } else {
            let buffer = &mut self.perception;
            self.boids
                .iter_mut()
                .enumerate()
                .map(|item| steer(buffer, item))
                .collect()
        };

        // Phase 2b: move everyone
        if self.params.enable_parallel {
            self.boids
                .par_iter_mut()
                .zip(outcomes.par_iter())
                .for_each(|(boid, outcome)| move_boid(boid, *outcome, dt));
        } else {
            for (boid, outcome) in self.boids.iter_mut().zip(&outcomes) {
                move_boid(boid, *outcome, dt);
            }
        }

        for outcome in outcomes {
            stats.record(outcome);
        }
        stats.elapsed = started.elapsed();

        trace!(
            tick = stats.tick,
            boids = stats.boids,
            leaves = stats.leaf_count,
            depth = stats.tree_depth,
            overrides = stats.boundary_overrides,
            skipped = stats.skipped,
            avg_neighbours = stats.average_neighbours(),
            "tick complete"
        );

        self.last_tick = stats;
        self.tick += 1;
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.snapshot.clear();
        self.snapshot.extend(self.boids.iter().map(Boid::view));

        for (i, view) in self.snapshot.iter().enumerate() {
            // Non-finite positions cannot be partitioned; their boid is skipped this tick
            if view.position.is_finite() {
                self.index.add(i, view.position);
            }
        }
    }
}

fn move_boid(boid: &mut Boid, outcome: StepOutcome, dt: f32) {
    if outcome != StepOutcome::Skipped {
        boid.advance(dt);
    }
}
