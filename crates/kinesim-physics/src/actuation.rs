//! Joint actuation and per-DOF velocity readback.
//!
//! Every joint kind maps to a fixed actuation behavior and a fixed set of
//! velocity components, driven by a `match` on [`JointKind`]. Actuation is
//! applied as equal-and-opposite wrenches on the two attached rigid bodies
//! about the world-frame joint axes. Ball joints are degenerate on both
//! sides: no actuation primitive exists for them and their velocity reads
//! back as three zeros.

use nalgebra::{UnitVector3, Vector3};
use rapier3d::prelude::{RigidBodyHandle, RigidBodySet};

use kinesim_scene::{Joint, JointKind};

// ---------------------------------------------------------------------------
// JointAxes
// ---------------------------------------------------------------------------

/// World-frame joint axes, derived from the parent body's current rotation.
pub(crate) struct JointAxes {
    pub primary: UnitVector3<f32>,
    pub secondary: UnitVector3<f32>,
}

/// Resolve a joint's axes into the world frame.
///
/// The scene stores axes in the parent link frame; the parent rigid body's
/// pose tracks that link, so its rotation carries them into the world.
pub(crate) fn world_axes(
    bodies: &RigidBodySet,
    parent: RigidBodyHandle,
    joint: &Joint,
) -> JointAxes {
    match bodies.get(parent) {
        Some(rb) => {
            let rotation = *rb.rotation();
            JointAxes {
                primary: rotation * joint.axis(),
                secondary: rotation * joint.second_axis(),
            }
        }
        None => JointAxes {
            primary: joint.axis(),
            secondary: joint.second_axis(),
        },
    }
}

// ---------------------------------------------------------------------------
// Actuation
// ---------------------------------------------------------------------------

/// Apply one actuation input per DOF to the joint's attached bodies.
///
/// `values` must already be validated to `kind.dof()` entries. Ball joints
/// are a no-op here; the facade logs the rejection.
pub(crate) fn apply_actuation(
    bodies: &mut RigidBodySet,
    kind: JointKind,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    axes: &JointAxes,
    values: &[f32],
) {
    match kind {
        JointKind::Ball => {}
        JointKind::Hinge => {
            add_torque_pair(bodies, parent, child, axes.primary.into_inner() * values[0]);
        }
        JointKind::Slider => {
            add_force_pair(bodies, parent, child, axes.primary.into_inner() * values[0]);
        }
        JointKind::Universal | JointKind::Hinge2 => {
            let torque = axes.primary.into_inner() * values[0]
                + axes.secondary.into_inner() * values[1];
            add_torque_pair(bodies, parent, child, torque);
        }
    }
}

fn add_torque_pair(
    bodies: &mut RigidBodySet,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    torque: Vector3<f32>,
) {
    if let Some(rb) = bodies.get_mut(child) {
        if rb.is_dynamic() {
            rb.add_torque(torque, true);
        }
    }
    if let Some(rb) = bodies.get_mut(parent) {
        if rb.is_dynamic() {
            rb.add_torque(-torque, true);
        }
    }
}

fn add_force_pair(
    bodies: &mut RigidBodySet,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    force: Vector3<f32>,
) {
    if let Some(rb) = bodies.get_mut(child) {
        if rb.is_dynamic() {
            rb.add_force(force, true);
        }
    }
    if let Some(rb) = bodies.get_mut(parent) {
        if rb.is_dynamic() {
            rb.add_force(-force, true);
        }
    }
}

// ---------------------------------------------------------------------------
// Velocity readback
// ---------------------------------------------------------------------------

/// Read one scalar joint rate per DOF from the attached bodies' relative
/// velocities projected onto the world-frame joint axes.
pub(crate) fn read_velocities(
    bodies: &RigidBodySet,
    kind: JointKind,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    axes: &JointAxes,
) -> Vec<f32> {
    let (parent_lin, parent_ang) = body_velocity(bodies, parent);
    let (child_lin, child_ang) = body_velocity(bodies, child);
    let rel_ang = child_ang - parent_ang;

    match kind {
        JointKind::Ball => vec![0.0; 3],
        JointKind::Hinge => vec![rel_ang.dot(&axes.primary)],
        JointKind::Slider => {
            let rel_lin = child_lin - parent_lin;
            vec![rel_lin.dot(&axes.primary)]
        }
        JointKind::Universal | JointKind::Hinge2 => {
            vec![rel_ang.dot(&axes.primary), rel_ang.dot(&axes.secondary)]
        }
    }
}

fn body_velocity(bodies: &RigidBodySet, handle: RigidBodyHandle) -> (Vector3<f32>, Vector3<f32>) {
    bodies
        .get(handle)
        .map_or((Vector3::zeros(), Vector3::zeros()), |rb| {
            (*rb.linvel(), *rb.angvel())
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
