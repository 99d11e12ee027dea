//! Joint data: kinds, degrees of freedom, and attachment frames.

use nalgebra::{Point3, UnitVector3, Vector3};

// ---------------------------------------------------------------------------
// JointKind
// ---------------------------------------------------------------------------

/// Closed set of joint kinds understood by the physics bridge.
///
/// Each kind carries a fixed degree-of-freedom count. Ball joints are
/// degenerate for actuation and velocity readback (see the physics crate);
/// their three DOF exist only for constraint purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKind {
    /// Spherical joint, 3 rotational DOF.
    Ball,
    /// Rotation about a single axis.
    Hinge,
    /// Translation along a single axis.
    Slider,
    /// Rotation about two perpendicular axes.
    Universal,
    /// Two rotation axes with the second attached to the child link
    /// (wheel-and-steering arrangement).
    Hinge2,
}

impl JointKind {
    /// Degrees of freedom for this joint kind.
    pub const fn dof(self) -> usize {
        match self {
            Self::Ball => 3,
            Self::Hinge | Self::Slider => 1,
            Self::Universal | Self::Hinge2 => 2,
        }
    }

    /// Whether the second axis participates in the joint definition.
    pub const fn uses_second_axis(self) -> bool {
        matches!(self, Self::Universal | Self::Hinge2)
    }
}

// ---------------------------------------------------------------------------
// Joint
// ---------------------------------------------------------------------------

/// A joint connecting two links of the same body.
///
/// The anchor and axes are expressed in the parent link's frame. The second
/// axis is only meaningful for [`JointKind::Universal`] and
/// [`JointKind::Hinge2`]; for other kinds it merely completes the joint basis.
#[derive(Debug, Clone)]
pub struct Joint {
    name: String,
    kind: JointKind,
    parent: usize,
    child: usize,
    anchor: Point3<f32>,
    axis: UnitVector3<f32>,
    axis2: UnitVector3<f32>,
}

impl Joint {
    /// Create a joint of the given kind between two link indices.
    ///
    /// Defaults: anchor at the parent origin, primary axis +Z, second axis +Y.
    pub fn new(name: impl Into<String>, kind: JointKind, parent: usize, child: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            parent,
            child,
            anchor: Point3::origin(),
            axis: Vector3::z_axis(),
            axis2: Vector3::y_axis(),
        }
    }

    /// Builder: set the anchor point (parent-link frame).
    pub fn with_anchor(mut self, anchor: Point3<f32>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Builder: set the primary axis (parent-link frame).
    pub fn with_axis(mut self, axis: UnitVector3<f32>) -> Self {
        self.axis = axis;
        self
    }

    /// Builder: set the second axis (parent-link frame).
    pub fn with_second_axis(mut self, axis: UnitVector3<f32>) -> Self {
        self.axis2 = axis;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> JointKind {
        self.kind
    }

    /// Index of the parent link within the owning body.
    pub const fn parent(&self) -> usize {
        self.parent
    }

    /// Index of the child link within the owning body.
    pub const fn child(&self) -> usize {
        self.child
    }

    pub const fn anchor(&self) -> Point3<f32> {
        self.anchor
    }

    pub const fn axis(&self) -> UnitVector3<f32> {
        self.axis
    }

    pub const fn second_axis(&self) -> UnitVector3<f32> {
        self.axis2
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
