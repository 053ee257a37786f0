//! Collision detection: broad-phase pair search, clipping helpers, exact
//! narrow-phase contacts, ray queries, and time of impact.

pub mod broadphase;
pub mod ccd;
pub mod clipping;
pub mod narrowphase;
pub mod queries;

pub use broadphase::{Broadphase, BoundingVolume, NaiveBroadphase, SweepAndPruneBroadphase};
pub use ccd::{ContinuousCollision, TimeOfImpact};
pub use narrowphase::{Narrowphase, ShapeInstance};
pub use queries::{Ray, RayMode, RaycastHit, RaycastResult};
