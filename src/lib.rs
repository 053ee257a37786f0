//! Planar Impulse – deterministic 2D rigid-body physics.
//!
//! Bodies carry one or more convex shapes. Each step finds candidate pairs
//! with a broadphase, builds contact and friction equations in the
//! narrowphase, solves them with a projected Gauss-Seidel solver using SPOOK
//! stabilization, and integrates with semi-implicit Euler plus optional
//! ray-based continuous collision.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::Vec2;

pub use collision::{
    BoundingVolume, Broadphase, ContinuousCollision, NaiveBroadphase, Narrowphase, Ray, RayMode,
    RaycastHit, RaycastResult, ShapeInstance, SweepAndPruneBroadphase, TimeOfImpact,
};
pub use config::{BroadphaseKind, SleepMode, SolverConfig, WorldConfig};
pub use core::{
    Aabb, BodyPose, BodyType, ContactMaterial, ConvexPolygon, Heightfield, Material, MaterialId,
    MaterialMixing, MixingMode, RigidBody, Shape, ShapeGeometry, ShapeHandle, ShapeKind,
    SleepState,
};
pub use dynamics::{
    AngleLockEquation, ContactEquation, Equation, FrictionEquation, GsSolver, Integrator,
    RotationalLockEquation, RotationalVelocityEquation, SolverEquation,
};
pub use error::{PhysicsError, PhysicsResult};
pub use utils::{Arena, EntityId, Pool, Poolable, TupleDictionary};
pub use world::World;
