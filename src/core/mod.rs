//! Core types describing bodies, shapes, materials, and bounds.

pub mod rigidbody;
pub mod shape;
pub mod types;

pub use rigidbody::{BodyPose, BodyType, RigidBody, SleepState};
pub use shape::{ConvexPolygon, Heightfield, Shape, ShapeGeometry, ShapeHandle, ShapeKind};
pub use types::{Aabb, ContactMaterial, Material, MaterialId, MaterialMixing, MixingMode};
