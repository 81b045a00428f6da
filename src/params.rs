/*
 * Simulation Parameters Module
 *
 * This module defines the tunable parameters for the boid simulation:
 * - SimulationParams: world bounds, index capacity, boundary inset, seed and
 *   execution settings, plus the default settings handed to new boids
 * - BoidSettings: per-boid movement, perception and steering configuration
 * - RuleSettings: an (enabled, strength) pair for one flocking rule
 * - SeparationWeighting, NeighbourQuery: rule and perception variants
 *
 * Every struct deserializes with defaults for missing fields so a partial JSON
 * file is a valid configuration.
 */

use serde::{Deserialize, Serialize};

use crate::error::{FlockError, Result};

// Toggle and weight for a single flocking rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub enabled: bool,
    pub strength: f32,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 1.0,
        }
    }
}

impl RuleSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_strength(strength: f32) -> Self {
        Self {
            enabled: true,
            strength,
        }
    }
}

// Per-boid movement and perception settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoidSettings {
    pub move_speed: f32,
    // Full opening angle of the vision cone, in degrees
    pub vision_angle: f32,
    pub detection_radius: f32,
    pub separation_radius: f32,
    pub alignment_radius: f32,
    pub cohesion_radius: f32,
    pub separation: RuleSettings,
    pub separation_weighting: SeparationWeighting,
    pub alignment: RuleSettings,
    pub cohesion: RuleSettings,
}

impl Default for BoidSettings {
    fn default() -> Self {
        Self {
            move_speed: 1.5,
            vision_angle: 180.0,
            detection_radius: 5.0,
            separation_radius: 2.0,
            alignment_radius: 4.0,
            cohesion_radius: 4.0,
            separation: RuleSettings::default(),
            separation_weighting: SeparationWeighting::Linear,
            alignment: RuleSettings::default(),
            cohesion: RuleSettings::default(),
        }
    }
}

impl BoidSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.move_speed.is_finite() {
            return Err(FlockError::config("move speed must be finite"));
        }
        if !(self.vision_angle.is_finite() && (0.0..=360.0).contains(&self.vision_angle)) {
            return Err(FlockError::config(format!(
                "vision angle must lie in [0, 360] degrees, got {}",
                self.vision_angle
            )));
        }

        let radii = [
            ("detection", self.detection_radius),
            ("separation", self.separation_radius),
            ("alignment", self.alignment_radius),
            ("cohesion", self.cohesion_radius),
        ];
        for (name, radius) in radii {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(FlockError::config(format!(
                    "{name} radius must be finite and >= 0, got {radius}"
                )));
            }
        }

        for (name, rule) in [
            ("separation", self.separation),
            ("alignment", self.alignment),
            ("cohesion", self.cohesion),
        ] {
            if !rule.strength.is_finite() {
                return Err(FlockError::config(format!("{name} strength must be finite")));
            }
        }

        Ok(())
    }

    // Cosine of the half vision angle, compared against normalized dot products
    #[inline]
    pub fn vision_threshold(&self) -> f32 {
        (self.vision_angle * 0.5).to_radians().cos()
    }
}

// How a neighbour's distance weights its separation push.
// Linear scales the raw offset by distance / radius, so the push grows
// towards the radius. Proximity scales the unit offset by 1 - distance / radius,
// so closer neighbours push harder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationWeighting {
    #[default]
    Linear,
    Proximity,
}

// How perception gathers candidates from the quadtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighbourQuery {
    // Items of the leaf containing the boid (fast, misses neighbours across leaf edges)
    #[default]
    Leaf,
    // Every leaf overlapping the detection circle
    Radius,
}

// Parameters for a whole simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub world_width: f32,
    pub world_height: f32,
    pub leaf_capacity: usize,
    pub boundary_inset: f32,
    pub seed: u64,
    pub neighbour_query: NeighbourQuery,
    // Performance settings
    pub enable_parallel: bool,
    pub fixed_physics_fps: f32,
    pub boid: BoidSettings,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            world_width: 55.0,
            world_height: 30.9375,
            leaf_capacity: 8,
            boundary_inset: 4.0,
            seed: 0x5EED,
            neighbour_query: NeighbourQuery::Leaf,
            enable_parallel: true,
            fixed_physics_fps: 50.0,
            boid: BoidSettings::default(),
        }
    }
}

impl SimulationParams {
    pub fn with_bounds(world_width: f32, world_height: f32, leaf_capacity: usize) -> Self {
        Self {
            world_width,
            world_height,
            leaf_capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.world_width.is_finite() && self.world_width > 0.0) {
            return Err(FlockError::config(format!(
                "world width must be > 0, got {}",
                self.world_width
            )));
        }
        if !(self.world_height.is_finite() && self.world_height > 0.0) {
            return Err(FlockError::config(format!(
                "world height must be > 0, got {}",
                self.world_height
            )));
        }
        if self.leaf_capacity == 0 {
            return Err(FlockError::config("leaf capacity must be > 0"));
        }
        if !(self.boundary_inset.is_finite() && self.boundary_inset >= 0.0) {
            return Err(FlockError::config("boundary inset must be finite and >= 0"));
        }
        let half_extent = self.world_width.min(self.world_height) * 0.5;
        if self.boundary_inset >= half_extent {
            return Err(FlockError::config(format!(
                "boundary inset {} leaves no interior in a {} x {} world",
                self.boundary_inset, self.world_width, self.world_height
            )));
        }
        if !(self.fixed_physics_fps.is_finite() && self.fixed_physics_fps > 0.0) {
            return Err(FlockError::config("fixed physics rate must be > 0"));
        }
        self.boid.validate()
    }

    // Length of one physics tick in seconds
    pub fn physics_step(&self) -> f32 {
        1.0 / self.fixed_physics_fps
    }
}
