/*
 * Debug Information Module
 *
 * This module defines the TickStats struct: counters gathered while a tick
 * runs, kept by the world for external consumers (driver logs, overlays).
 *
 * Includes metrics for:
 * - Population and how many boids made it into the index
 * - Quadtree shape (leaves and depth)
 * - Boundary overrides and isolated (skipped) boids
 * - Neighbour counts seen during perception
 * - Wall time spent in the tick
 */

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStats {
    pub tick: u64,
    pub boids: usize,
    pub indexed: usize,
    pub leaf_count: usize,
    pub tree_depth: u32,
    pub boundary_overrides: usize,
    pub skipped: usize,
    pub total_neighbours: usize,
    pub max_neighbours: usize,
    pub elapsed: Duration,
}

impl TickStats {
    pub fn average_neighbours(&self) -> f32 {
        let steered = self.boids.saturating_sub(self.skipped);
        if steered == 0 {
            0.0
        } else {
            self.total_neighbours as f32 / steered as f32
        }
    }

    // Record one boid's outcome
    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Steered { neighbours, overridden } => {
                self.total_neighbours += neighbours;
                self.max_neighbours = self.max_neighbours.max(neighbours);
                if overridden {
                    self.boundary_overrides += 1;
                }
            }
            StepOutcome::Skipped => self.skipped += 1,
        }
    }
}

// What happened to a single boid during the decide phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Steered { neighbours: usize, overridden: bool },
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_steered_boids_only() {
        let mut stats = TickStats {
            boids: 4,
            ..TickStats::default()
        };
        stats.record(StepOutcome::Steered { neighbours: 3, overridden: false });
        stats.record(StepOutcome::Steered { neighbours: 1, overridden: true });
        stats.record(StepOutcome::Steered { neighbours: 2, overridden: false });
        stats.record(StepOutcome::Skipped);

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.boundary_overrides, 1);
        assert_eq!(stats.max_neighbours, 3);
        assert!((stats.average_neighbours() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn empty_tick_has_zero_average() {
        assert_eq!(TickStats::default().average_neighbours(), 0.0);
    }
}
