/*
 * Boid Flocking Simulation - Module Definitions
 *
 * This file defines the module structure of the simulation core. Boids steer by
 * separation, alignment and cohesion, find their neighbours through a quadtree
 * rebuilt every tick, and turn back from the edges of a bounded world.
 */

// Re-export key components for easier access
pub use boid::{Boid, BoidId, PerceptionBuffer};
pub use boundary::BoundaryPolicy;
pub use debug::TickStats;
pub use error::FlockError;
pub use params::{BoidSettings, NeighbourQuery, RuleSettings, SeparationWeighting, SimulationParams};
pub use quadtree::{QuadTree, Rect, Section};
pub use rules::BoidView;
pub use world::World;

pub use glam::Vec2;

// Define modules
pub mod boid;
pub mod boundary;
pub mod debug;
pub mod error;
pub mod params;
pub mod quadtree;
pub mod rules;
pub mod world;

// Constants
pub const BLEND_FACTOR: f32 = 0.1;
pub const BOUNDARY_JITTER_DEGREES: f32 = 45.0;
pub const SEED_DERIVATION_PRIME: u64 = 0x9E37_79B9_7F4A_7C15;
