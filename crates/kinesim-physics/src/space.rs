//! Body/link synchronization layer between the scene graph and the solver.
//!
//! All rapier state lives in one struct: `PhysicsPipeline::step()` needs
//! mutable access to every set simultaneously. Alongside the sets sits the
//! side-table mapping scene bodies to their solver handles; the scene graph
//! itself never owns solver state.

use std::collections::HashMap;

use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, UnitQuaternion, UnitVector3, Vector3};
use rapier3d::prelude::*;
use tracing::debug;

use kinesim_scene::{BodyId, CollisionShape, JointKind, Scene, ShapeKind};

use crate::error::PhysicsError;
use crate::filter::pack_link_ref;

// ---------------------------------------------------------------------------
// Solver-side per-body state
// ---------------------------------------------------------------------------

/// Solver handles for one scene link.
///
/// Every link gets a rigid body so its colliders track the scene transform;
/// only dynamic links (positive mass, not kinematic) expose that body through
/// [`SolverSpace::link_body`].
#[derive(Debug)]
pub struct LinkSolverState {
    pub body: RigidBodyHandle,
    pub colliders: Vec<ColliderHandle>,
    pub dynamic: bool,
}

/// Solver handles for one scene joint.
#[derive(Debug)]
pub struct JointSolverState {
    pub handle: ImpulseJointHandle,
    pub kind: JointKind,
    pub parent_body: RigidBodyHandle,
    pub child_body: RigidBodyHandle,
}

/// Side-table entry: everything the solver knows about one scene body.
#[derive(Debug)]
pub struct BodySolverData {
    pub links: Vec<LinkSolverState>,
    pub joints: Vec<JointSolverState>,
    /// Scene update stamp at the last synchronization or pose write-back.
    pub last_stamp: u64,
}

/// Fires after a body's scene state has been pulled into the solver.
pub type SyncCallback = Box<dyn FnMut(&mut RigidBodySet, &BodySolverData)>;

// ---------------------------------------------------------------------------
// SolverSpace
// ---------------------------------------------------------------------------

/// Owns the rapier world and keeps it synchronized with the scene graph.
pub struct SolverSpace {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,

    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    params: IntegrationParameters,

    data: HashMap<BodyId, BodySolverData>,
    sync_callback: Option<SyncCallback>,
    initialized: bool,
}

impl Default for SolverSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverSpace {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            params: IntegrationParameters::default(),
            data: HashMap::new(),
            sync_callback: None,
            initialized: false,
        }
    }

    /// Create a fresh solver world, discarding any previous one.
    pub fn init(&mut self) {
        *self = Self::new();
        self.initialized = true;
    }

    /// Release the solver world and every per-body attachment. Safe to call
    /// repeatedly.
    pub fn destroy(&mut self) {
        *self = Self::new();
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Register the callback fired whenever scene state is pulled into the
    /// solver. Replaces any previous callback.
    pub fn set_sync_callback(&mut self, callback: SyncCallback) {
        self.sync_callback = Some(callback);
    }

    // -- construction -------------------------------------------------------

    /// Create solver state for a scene body, replacing any prior state.
    pub fn init_body(&mut self, scene: &Scene, id: BodyId) -> Result<(), PhysicsError> {
        if !self.initialized {
            return Err(PhysicsError::NotInitialized);
        }
        let body = scene.body(id).ok_or(PhysicsError::UnknownBody(id))?;
        if self.data.contains_key(&id) {
            self.remove_body_state(id);
        }

        let body_enabled = body.enabled();
        let mut links = Vec::with_capacity(body.links().len());
        for (index, link) in body.links().iter().enumerate() {
            let dynamic = link.is_dynamic();
            let builder = if dynamic {
                RigidBodyBuilder::dynamic()
                    .position(link.transform())
                    .can_sleep(false)
                    .additional_mass_properties(MassProperties::new(
                        Point3::from(link.com_offset()),
                        link.mass(),
                        link.inertia(),
                    ))
            } else {
                RigidBodyBuilder::fixed().position(link.transform())
            };
            let handle = self.bodies.insert(builder.build());

            let enabled = body_enabled && link.enabled();
            let mut colliders = Vec::with_capacity(link.shapes().len());
            for shape in link.shapes() {
                let collider = collider_for(shape)
                    .active_hooks(
                        ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::MODIFY_SOLVER_CONTACTS,
                    )
                    .user_data(pack_link_ref(id, index))
                    .build();
                let collider_handle =
                    self.colliders
                        .insert_with_parent(collider, handle, &mut self.bodies);
                if let Some(c) = self.colliders.get_mut(collider_handle) {
                    c.set_enabled(enabled);
                }
                colliders.push(collider_handle);
            }
            if let Some(rb) = self.bodies.get_mut(handle) {
                rb.set_enabled(enabled);
            }

            links.push(LinkSolverState {
                body: handle,
                colliders,
                dynamic,
            });
        }

        let mut joints = Vec::with_capacity(body.joints().len());
        for joint in body.joints() {
            let parent_state = &links[joint.parent()];
            let child_state = &links[joint.child()];
            let parent_transform = body.links()[joint.parent()].transform();
            let child_transform = body.links()[joint.child()].transform();

            let generic = build_joint(joint, &parent_transform, &child_transform);
            let handle =
                self.impulse_joints
                    .insert(parent_state.body, child_state.body, generic, true);
            joints.push(JointSolverState {
                handle,
                kind: joint.kind(),
                parent_body: parent_state.body,
                child_body: child_state.body,
            });
        }

        debug!(
            body = body.name(),
            links = links.len(),
            joints = joints.len(),
            "attached solver state"
        );
        self.data.insert(
            id,
            BodySolverData {
                links,
                joints,
                last_stamp: body.update_stamp(),
            },
        );
        Ok(())
    }

    fn remove_body_state(&mut self, id: BodyId) {
        let Some(data) = self.data.remove(&id) else {
            return;
        };
        for joint in &data.joints {
            self.impulse_joints
                .remove(joint.handle, true);
        }
        for link in &data.links {
            self.bodies.remove(
                link.body,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    // -- synchronization ----------------------------------------------------

    /// Push pending scene changes for every known body into the solver.
    pub fn synchronize(&mut self, scene: &Scene) {
        let ids: Vec<BodyId> = self.data.keys().copied().collect();
        for id in ids {
            self.synchronize_body(scene, id);
        }
    }

    /// Push pending scene changes for one body into the solver.
    ///
    /// No-op when the body's update stamp has not moved since the last
    /// synchronization, so repeated calls are idempotent. When state is
    /// pulled, the registered sync callback fires afterwards.
    pub fn synchronize_body(&mut self, scene: &Scene, id: BodyId) {
        let Some(body) = scene.body(id) else {
            return;
        };
        let Some(data) = self.data.get_mut(&id) else {
            return;
        };
        if data.last_stamp == body.update_stamp() {
            return;
        }

        let body_enabled = body.enabled();
        for (link, state) in body.links().iter().zip(&data.links) {
            if let Some(rb) = self.bodies.get_mut(state.body) {
                rb.set_position(link.transform(), true);
            }
            let enabled = body_enabled && link.enabled();
            for &collider in &state.colliders {
                if let Some(c) = self.colliders.get_mut(collider) {
                    c.set_enabled(enabled);
                }
            }
            if let Some(rb) = self.bodies.get_mut(state.body) {
                rb.set_enabled(enabled);
            }
        }
        data.last_stamp = body.update_stamp();

        if let Some(callback) = self.sync_callback.as_mut() {
            callback(&mut self.bodies, data);
        }
    }

    // -- stepping -----------------------------------------------------------

    /// Advance the solver by exactly `dt` (one full step, no sub-stepping).
    ///
    /// Contact constraints generated during the step are transient to it.
    /// Force and torque accumulators are cleared afterwards, so facade-level
    /// force application covers a single step.
    pub(crate) fn step(&mut self, gravity: &Vector3<f32>, dt: f32, hooks: &dyn PhysicsHooks) {
        self.params.dt = dt;
        self.pipeline.step(
            gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            hooks,
            &(),
        );
        for (_, rb) in self.bodies.iter_mut() {
            rb.reset_forces(false);
            rb.reset_torques(false);
        }
    }

    /// Copy every dynamic link's solver pose back into the scene and record
    /// the resulting update stamps.
    ///
    /// A mismatch between scene and cached solver link state means the two
    /// representations have silently diverged; that is a programming error
    /// and asserts rather than returning.
    pub(crate) fn write_back(&mut self, scene: &mut Scene) {
        for (&id, data) in self.data.iter_mut() {
            let body = scene
                .body_mut(id)
                .unwrap_or_else(|| panic!("{id} has solver state but is missing from the scene"));
            assert_eq!(
                data.links.len(),
                body.links().len(),
                "scene and solver link counts diverged for {id}"
            );
            for (index, state) in data.links.iter().enumerate() {
                if !state.dynamic {
                    continue;
                }
                let rb = self
                    .bodies
                    .get(state.body)
                    .unwrap_or_else(|| panic!("dynamic link {index} of {id} lost its rigid body"));
                let pose: Isometry3<f32> = *rb.position();
                body.set_link_transform(index, pose)
                    .expect("link index validated against solver state");
            }
            data.last_stamp = body.update_stamp();
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn body_data(&self, id: BodyId) -> Option<&BodySolverData> {
        self.data.get(&id)
    }

    /// Rigid body handle for a link, if the link participates in dynamics.
    pub fn link_body(&self, id: BodyId, index: usize) -> Option<RigidBodyHandle> {
        let state = self.data.get(&id)?.links.get(index)?;
        state.dynamic.then_some(state.body)
    }

    pub fn joint_state(&self, id: BodyId, index: usize) -> Option<&JointSolverState> {
        self.data.get(&id)?.joints.get(index)
    }

    pub(crate) fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    pub(crate) fn bodies_mut(&mut self) -> &mut RigidBodySet {
        &mut self.bodies
    }

    /// Number of collider pairs with at least one active contact after the
    /// last step.
    pub fn active_contact_pairs(&self) -> usize {
        self.narrow_phase
            .contact_pairs()
            .filter(|pair| pair.has_any_active_contact)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Shape and joint construction
// ---------------------------------------------------------------------------

fn collider_for(shape: &CollisionShape) -> ColliderBuilder {
    let builder = match shape.kind {
        ShapeKind::Sphere { radius } => ColliderBuilder::ball(radius),
        ShapeKind::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents[0], half_extents[1], half_extents[2])
        }
        ShapeKind::Capsule {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(half_height, radius),
        ShapeKind::Cylinder {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(half_height, radius),
    };
    builder.position(shape.origin)
}

/// Build the rapier joint for a scene joint.
///
/// The joint frame's X axis is the primary joint axis; the second axis is
/// orthonormalized into the frame's Y. Frames are expressed locally to each
/// attached link from their transforms at initialization time.
fn build_joint(
    joint: &kinesim_scene::Joint,
    parent_transform: &Isometry3<f32>,
    child_transform: &Isometry3<f32>,
) -> GenericJoint {
    let locked = match joint.kind() {
        JointKind::Ball => JointAxesMask::LOCKED_SPHERICAL_AXES,
        JointKind::Hinge => JointAxesMask::LOCKED_REVOLUTE_AXES,
        JointKind::Slider => JointAxesMask::LOCKED_PRISMATIC_AXES,
        JointKind::Universal | JointKind::Hinge2 => {
            JointAxesMask::LOCKED_SPHERICAL_AXES | JointAxesMask::ANG_Z
        }
    };

    let frame1 = Isometry3::from_parts(
        joint.anchor().coords.into(),
        joint_basis(joint.axis(), joint.second_axis()),
    );
    let world_frame = parent_transform * frame1;
    let frame2 = child_transform.inverse() * world_frame;

    let mut generic = GenericJointBuilder::new(locked).build();
    generic.local_frame1 = frame1;
    generic.local_frame2 = frame2;
    generic
}

/// Orthonormal joint basis: X along the primary axis, Y along the
/// (Gram-Schmidt corrected) second axis.
fn joint_basis(primary: UnitVector3<f32>, secondary: UnitVector3<f32>) -> UnitQuaternion<f32> {
    let x = primary.into_inner();
    let mut y = secondary.into_inner() - x * x.dot(&secondary);
    if y.norm_squared() < 1.0e-8 {
        y = x.cross(&fallback_orthogonal(&x));
    }
    let y = y.normalize();
    let z = x.cross(&y);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
        Matrix3::from_columns(&[x, y, z]),
    ))
}

fn fallback_orthogonal(v: &Vector3<f32>) -> Vector3<f32> {
    if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
