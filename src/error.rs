/*
 * Error Module
 *
 * Typed failures surfaced by the simulation core. Nothing in the core does I/O,
 * so every error is either a rejected configuration or a stale agent handle.
 */

use crate::boid::BoidId;

/// Errors returned by world, index and settings operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlockError {
    /// Bounds, capacity, inset or per-boid settings failed validation.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The handle does not refer to a live boid (removed or never issued).
    #[error("invalid agent reference: {0:?}")]
    InvalidAgentReference(BoidId),
}

impl FlockError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FlockError>;
