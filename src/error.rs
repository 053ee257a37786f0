//! Error type shared by the world, shape construction, and broadphase configuration.

use thiserror::Error;

use crate::utils::allocator::EntityId;

/// Misuse of the engine surfaced to the caller.
///
/// Runtime geometry never produces an error: disjoint or unsupported shape
/// pairs simply yield zero contacts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f32),

    #[error("body {0:?} does not exist in this world")]
    BodyNotFound(EntityId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used across the crate.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
