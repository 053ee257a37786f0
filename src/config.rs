//! Default constants and serde-friendly configuration for the engine.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::collision::broadphase::BoundingVolume;

/// Default gravity vector applied in the world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -9.78];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Upper bound on fixed sub-steps taken by a single [`crate::World::step`] call.
pub const DEFAULT_MAX_SUB_STEPS: u32 = 10;

/// Gauss-Seidel sweeps per step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 10;

/// Convergence threshold on the summed impulse change of one sweep, per equation.
pub const DEFAULT_SOLVER_TOLERANCE: f32 = 1e-7;

/// Constraint stiffness used by every new equation.
pub const DEFAULT_STIFFNESS: f32 = 1e6;

/// Number of time steps a constraint violation needs to relax.
pub const DEFAULT_RELAXATION: f32 = 4.0;

/// Friction force bound used before any normal force is known.
pub const DEFAULT_SLIP_FORCE: f32 = 10.0;

/// Friction coefficient of the default contact material.
pub const DEFAULT_FRICTION: f32 = 0.3;

/// Skin thickness of the default contact material.
pub const DEFAULT_CONTACT_SKIN_SIZE: f32 = 0.005;

/// Skin thickness used by a narrowphase before any material is applied.
pub const NARROWPHASE_CONTACT_SKIN_SIZE: f32 = 0.01;

/// Default damping applied to linear velocity (fraction lost per second).
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.1;

/// Default damping applied to angular velocity (fraction lost per second).
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.1;

/// Speed below which a body counts as idle.
pub const DEFAULT_SLEEP_SPEED_LIMIT: f32 = 0.2;

/// Idle seconds before a body falls asleep.
pub const DEFAULT_SLEEP_TIME_LIMIT: f32 = 1.0;

/// Bisection steps used when searching for a time of impact.
pub const DEFAULT_CCD_ITERATIONS: u32 = 10;

/// Extent used for shapes that are unbounded along some axis.
pub const UNBOUNDED_EXTENT: f32 = 1e7;

/// Which broadphase the world builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BroadphaseKind {
    Naive,
    #[default]
    SweepAndPrune,
}

/// How bodies are put to sleep after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SleepMode {
    #[default]
    NoSleeping,
    BodySleeping,
}

/// Gauss-Seidel solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub iterations: u32,
    pub tolerance: f32,
    /// Sweeps spent estimating normal forces before friction bounds are rescaled.
    /// Zero disables the pre-pass.
    pub friction_iterations: u32,
    /// Start each solve from the impulses stored on the equations.
    pub warm_starting: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SOLVER_ITERATIONS,
            tolerance: DEFAULT_SOLVER_TOLERANCE,
            friction_iterations: 0,
            warm_starting: false,
        }
    }
}

/// Everything the world step loop reads from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: Vec2,
    pub time_step: f32,
    pub max_sub_steps: u32,
    pub solver: SolverConfig,
    pub broadphase: BroadphaseKind,
    pub bounding_volume: BoundingVolume,
    pub sleep_mode: SleepMode,
    pub enable_friction: bool,
    pub enable_friction_reduction: bool,
    pub apply_gravity: bool,
    pub apply_damping: bool,
    pub frame_budget_ms: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::from_array(DEFAULT_GRAVITY),
            time_step: DEFAULT_TIME_STEP,
            max_sub_steps: DEFAULT_MAX_SUB_STEPS,
            solver: SolverConfig::default(),
            broadphase: BroadphaseKind::default(),
            bounding_volume: BoundingVolume::default(),
            sleep_mode: SleepMode::default(),
            enable_friction: true,
            enable_friction_reduction: true,
            apply_gravity: true,
            apply_damping: true,
            frame_budget_ms: 16.0,
        }
    }
}
