//! Link data: transforms, mass properties, and collision geometry.

use nalgebra::{Isometry3, Vector3};

// ---------------------------------------------------------------------------
// ShapeKind
// ---------------------------------------------------------------------------

/// Primitive collision geometry carried by a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    Sphere { radius: f32 },
    Cuboid { half_extents: [f32; 3] },
    Capsule { radius: f32, half_height: f32 },
    Cylinder { radius: f32, half_height: f32 },
}

// ---------------------------------------------------------------------------
// CollisionShape
// ---------------------------------------------------------------------------

/// A collision primitive with its offset from the link frame.
#[derive(Debug, Clone)]
pub struct CollisionShape {
    /// Shape pose relative to the link frame.
    pub origin: Isometry3<f32>,
    pub kind: ShapeKind,
}

impl CollisionShape {
    /// A sphere centered on the link origin.
    pub fn sphere(radius: f32) -> Self {
        Self {
            origin: Isometry3::identity(),
            kind: ShapeKind::Sphere { radius },
        }
    }

    /// A cuboid centered on the link origin.
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self {
            origin: Isometry3::identity(),
            kind: ShapeKind::Cuboid {
                half_extents: [hx, hy, hz],
            },
        }
    }

    /// A capsule along the link's local Y axis.
    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self {
            origin: Isometry3::identity(),
            kind: ShapeKind::Capsule {
                radius,
                half_height,
            },
        }
    }

    /// A cylinder along the link's local Y axis.
    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        Self {
            origin: Isometry3::identity(),
            kind: ShapeKind::Cylinder {
                radius,
                half_height,
            },
        }
    }

    /// Builder: offset the shape from the link frame.
    pub fn with_origin(mut self, origin: Isometry3<f32>) -> Self {
        self.origin = origin;
        self
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// A rigid link of a scene body.
///
/// A link participates in dynamics when it has positive mass and is not
/// flagged kinematic; otherwise it is treated as a fixed anchor whose pose
/// is dictated by the scene alone.
#[derive(Debug, Clone)]
pub struct Link {
    name: String,
    transform: Isometry3<f32>,
    com_offset: Vector3<f32>,
    mass: f32,
    inertia: Vector3<f32>,
    shapes: Vec<CollisionShape>,
    enabled: bool,
    kinematic: bool,
}

impl Link {
    /// Create a massless link at the origin with no geometry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Isometry3::identity(),
            com_offset: Vector3::zeros(),
            mass: 0.0,
            inertia: Vector3::zeros(),
            shapes: Vec::new(),
            enabled: true,
            kinematic: false,
        }
    }

    /// Builder: set the world transform.
    pub fn with_transform(mut self, transform: Isometry3<f32>) -> Self {
        self.transform = transform;
        self
    }

    /// Builder: set the mass (kg).
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Builder: set the principal inertia about the center of mass.
    pub fn with_inertia(mut self, inertia: Vector3<f32>) -> Self {
        self.inertia = inertia;
        self
    }

    /// Builder: set the center-of-mass offset in the link frame.
    pub fn with_com_offset(mut self, offset: Vector3<f32>) -> Self {
        self.com_offset = offset;
        self
    }

    /// Builder: add a collision shape.
    pub fn with_shape(mut self, shape: CollisionShape) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Builder: flag the link as kinematic (pose driven by the scene only).
    pub fn with_kinematic(mut self, kinematic: bool) -> Self {
        self.kinematic = kinematic;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn transform(&self) -> Isometry3<f32> {
        self.transform
    }

    pub(crate) fn set_transform(&mut self, transform: Isometry3<f32>) {
        self.transform = transform;
    }

    pub const fn com_offset(&self) -> Vector3<f32> {
        self.com_offset
    }

    pub const fn mass(&self) -> f32 {
        self.mass
    }

    pub const fn inertia(&self) -> Vector3<f32> {
        self.inertia
    }

    pub fn shapes(&self) -> &[CollisionShape] {
        &self.shapes
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether this link has a dynamic representation in the solver.
    pub fn is_dynamic(&self) -> bool {
        self.mass > 0.0 && !self.kinematic
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
