use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_CONTACT_SKIN_SIZE, DEFAULT_FRICTION, DEFAULT_RELAXATION, DEFAULT_STIFFNESS,
};

/// Common math types re-exported for convenience.
pub use glam::Vec2;

/// Axis-aligned bounding box. `lower <= upper` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            lower: Vec2::ZERO,
            upper: Vec2::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self {
            lower: lower.min(upper),
            upper: lower.max(upper),
        }
    }

    /// Tightest box around `points`, transformed by `position`/`angle` first.
    pub fn from_points(points: &[Vec2], position: Vec2, angle: f32, skin_size: f32) -> Self {
        let rot = Vec2::from_angle(angle);
        let mut lower = Vec2::splat(f32::MAX);
        let mut upper = Vec2::splat(f32::MIN);
        for p in points {
            let world = rot.rotate(*p) + position;
            lower = lower.min(world);
            upper = upper.max(world);
        }
        if points.is_empty() {
            lower = position;
            upper = position;
        }
        Self {
            lower: lower - Vec2::splat(skin_size),
            upper: upper + Vec2::splat(skin_size),
        }
    }

    /// Grows this box to contain `other`.
    pub fn extend(&mut self, other: &Aabb) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    /// Touching boxes count as overlapping.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower.x <= other.upper.x
            && other.lower.x <= self.upper.x
            && self.lower.y <= other.upper.y
            && other.lower.y <= self.upper.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.lower.x
            && point.x <= self.upper.x
            && point.y >= self.lower.y
            && point.y <= self.upper.y
    }

    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    pub fn extents(&self) -> Vec2 {
        self.upper - self.lower
    }
}

/// Handle to a [`Material`] registered with the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Surface coefficients of one material, mixed per pair when no explicit
/// [`ContactMaterial`] is registered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
    pub mixing: MaterialMixing,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: DEFAULT_FRICTION,
            restitution: 0.0,
            mixing: MaterialMixing::default(),
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            friction: 1.0,
            restitution: 0.8,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn ice() -> Self {
        Self {
            friction: 0.03,
            restitution: 0.05,
            mixing: MaterialMixing::default().with_friction(MixingMode::Min),
        }
    }

    /// Builds contact parameters for a pair of materials, honouring the
    /// non-average mixing mode if either side sets one.
    pub fn combine(a: &Self, b: &Self) -> ContactMaterial {
        let friction_mode = a.mixing.friction.resolve(b.mixing.friction);
        let restitution_mode = a.mixing.restitution.resolve(b.mixing.restitution);
        ContactMaterial {
            friction: friction_mode.combine(a.friction, b.friction),
            restitution: restitution_mode.combine(a.restitution, b.restitution),
            ..ContactMaterial::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MaterialMixing {
    pub friction: MixingMode,
    pub restitution: MixingMode,
}

impl MaterialMixing {
    pub fn with_friction(mut self, mode: MixingMode) -> Self {
        self.friction = mode;
        self
    }

    pub fn with_restitution(mut self, mode: MixingMode) -> Self {
        self.restitution = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MixingMode {
    #[default]
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.abs() * b.abs()).sqrt(),
        }
    }

    fn resolve(self, other: MixingMode) -> MixingMode {
        if matches!(self, MixingMode::Average) {
            other
        } else {
            self
        }
    }
}

/// Contact parameters used by the narrowphase for one pair of materials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactMaterial {
    pub material_a: Option<MaterialId>,
    pub material_b: Option<MaterialId>,
    pub friction: f32,
    pub restitution: f32,
    pub stiffness: f32,
    pub relaxation: f32,
    pub friction_stiffness: f32,
    pub friction_relaxation: f32,
    /// Tangential surface speed, as on a conveyor belt.
    pub surface_velocity: f32,
    /// Extra distance at which contacts are generated before shapes touch.
    pub contact_skin_size: f32,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            material_a: None,
            material_b: None,
            friction: DEFAULT_FRICTION,
            restitution: 0.0,
            stiffness: DEFAULT_STIFFNESS,
            relaxation: DEFAULT_RELAXATION,
            friction_stiffness: DEFAULT_STIFFNESS,
            friction_relaxation: DEFAULT_RELAXATION,
            surface_velocity: 0.0,
            contact_skin_size: DEFAULT_CONTACT_SKIN_SIZE,
        }
    }
}

impl ContactMaterial {
    pub fn new(material_a: MaterialId, material_b: MaterialId) -> Self {
        Self {
            material_a: Some(material_a),
            material_b: Some(material_b),
            ..Self::default()
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }
}
