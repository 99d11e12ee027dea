//! Engine facade: simulation parameters, the accessor API, and the step
//! driver.

use std::cell::RefCell;

use nalgebra::{Point3, Vector3};
use rapier3d::prelude::RigidBodyHandle;
use tracing::warn;

use kinesim_scene::{BodyId, JointKind, Scene};

use crate::actuation;
use crate::config::{PhysicsConfig, PhysicsOptions};
use crate::error::PhysicsError;
use crate::filter::NearPhaseFilter;
use crate::report::{CallbackId, CallbackRegistry, CollisionCallback, CollisionReport};
use crate::space::SolverSpace;

// ---------------------------------------------------------------------------
// PhysicsEngine
// ---------------------------------------------------------------------------

/// Bridge between the scene graph and the rigid-body solver.
///
/// Owns the solver space, the global simulation parameters, the collision
/// callback registry, and the collision-report scratch buffer. All state is
/// exclusive to the engine for the duration of a call; the engine is not
/// reentrant and concurrent use requires external serialization.
pub struct PhysicsEngine {
    space: SolverSpace,
    gravity: Vector3<f32>,
    global_friction: f32,
    options: PhysicsOptions,
    callbacks: CallbackRegistry,
    report: RefCell<CollisionReport>,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(&PhysicsConfig::default())
    }
}

impl PhysicsEngine {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            space: SolverSpace::new(),
            gravity: Vector3::new(config.gravity[0], config.gravity[1], config.gravity[2]),
            global_friction: config.friction,
            options: config.options(),
            callbacks: CallbackRegistry::default(),
            report: RefCell::new(CollisionReport::new()),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Create the solver world and attach solver state for every scene body.
    ///
    /// Registers the synchronization callback that clears residual momentum
    /// whenever a body's scene transform is pulled into the solver: an
    /// external teleport must not keep the old velocity. Forces are left
    /// untouched since the sync may happen long after they were applied.
    pub fn init_environment(&mut self, scene: &Scene) -> Result<(), PhysicsError> {
        self.space.init();
        self.space.set_sync_callback(Box::new(|bodies, data| {
            for link in &data.links {
                if !link.dynamic {
                    continue;
                }
                if let Some(rb) = bodies.get_mut(link.body) {
                    rb.set_linvel(Vector3::zeros(), false);
                    rb.set_angvel(Vector3::zeros(), false);
                }
            }
        }));
        for (id, _) in scene.bodies() {
            self.space.init_body(scene, id)?;
        }
        Ok(())
    }

    /// Release the solver world and all per-body state. Safe to call
    /// repeatedly.
    pub fn destroy_environment(&mut self) {
        self.callbacks.clear();
        self.report.borrow_mut().reset();
        self.space.destroy();
    }

    /// Attach solver state for a body added to the scene after
    /// [`init_environment`](Self::init_environment).
    pub fn init_body(&mut self, scene: &Scene, id: BodyId) -> Result<(), PhysicsError> {
        self.space.init_body(scene, id)
    }

    // -- parameters ---------------------------------------------------------

    pub const fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    /// Set gravity. Takes effect on the next step; nothing is lost if the
    /// environment is not initialized yet.
    pub fn set_gravity(&mut self, gravity: Vector3<f32>) {
        self.gravity = gravity;
    }

    pub const fn options(&self) -> PhysicsOptions {
        self.options
    }

    /// Replace the option bitmask. Bits beyond the self-collision flag are
    /// preserved but not interpreted.
    pub fn set_options(&mut self, options: PhysicsOptions) {
        self.options = options;
    }

    pub const fn global_friction(&self) -> f32 {
        self.global_friction
    }

    pub fn set_global_friction(&mut self, friction: f32) {
        self.global_friction = friction;
    }

    // -- collision callbacks ------------------------------------------------

    /// Register a collision callback; callbacks run in registration order.
    pub fn register_collision_callback(&mut self, callback: CollisionCallback) -> CallbackId {
        self.callbacks.register(callback)
    }

    /// Remove a previously registered callback.
    pub fn unregister_collision_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }

    // -- velocity accessors -------------------------------------------------

    /// Set one link's linear and angular velocity.
    ///
    /// The linear velocity is given at the link origin; the solver tracks the
    /// center of mass, so the angular contribution over the COM offset is
    /// added symmetrically to the readback correction.
    pub fn set_link_velocity(
        &mut self,
        scene: &Scene,
        id: BodyId,
        index: usize,
        linear: Vector3<f32>,
        angular: Vector3<f32>,
    ) -> Result<(), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let link = scene
            .body(id)
            .ok_or(PhysicsError::UnknownBody(id))?
            .link(index)
            .ok_or(PhysicsError::LinkOutOfRange { index })?;
        let handle = self.dynamic_handle(id, index)?;
        let com_arm = link.transform().rotation * link.com_offset();
        let rb = self
            .space
            .bodies_mut()
            .get_mut(handle)
            .ok_or(PhysicsError::NoDynamicBody)?;
        rb.set_linvel(linear + angular.cross(&com_arm), true);
        rb.set_angvel(angular, true);
        Ok(())
    }

    /// Set every link's velocity at once, indexed like the body's links.
    ///
    /// Links without a dynamic representation are skipped; if any were
    /// skipped the call still applies the rest and reports failure.
    pub fn set_body_velocities(
        &mut self,
        scene: &Scene,
        id: BodyId,
        velocities: &[(Vector3<f32>, Vector3<f32>)],
    ) -> Result<(), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let body = scene.body(id).ok_or(PhysicsError::UnknownBody(id))?;
        if velocities.len() != body.links().len() {
            return Err(PhysicsError::VelocityCountMismatch {
                expected: body.links().len(),
                got: velocities.len(),
            });
        }
        let data = self
            .space
            .body_data(id)
            .ok_or(PhysicsError::UninitializedBody(id))?;
        let states: Vec<(RigidBodyHandle, bool)> =
            data.links.iter().map(|s| (s.body, s.dynamic)).collect();

        let mut all_dynamic = true;
        for (index, ((handle, dynamic), (linear, angular))) in
            states.into_iter().zip(velocities).enumerate()
        {
            if !dynamic {
                all_dynamic = false;
                continue;
            }
            let link = body.link(index).ok_or(PhysicsError::LinkOutOfRange { index })?;
            let com_arm = link.transform().rotation * link.com_offset();
            if let Some(rb) = self.space.bodies_mut().get_mut(handle) {
                rb.set_linvel(linear + angular.cross(&com_arm), true);
                rb.set_angvel(*angular, true);
            }
        }
        if all_dynamic {
            Ok(())
        } else {
            Err(PhysicsError::NoDynamicBody)
        }
    }

    /// Read one link's linear and angular velocity. Links without dynamics
    /// report zeros.
    pub fn link_velocity(
        &mut self,
        scene: &Scene,
        id: BodyId,
        index: usize,
    ) -> Result<(Vector3<f32>, Vector3<f32>), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let link = scene
            .body(id)
            .ok_or(PhysicsError::UnknownBody(id))?
            .link(index)
            .ok_or(PhysicsError::LinkOutOfRange { index })?;
        let data = self
            .space
            .body_data(id)
            .ok_or(PhysicsError::UninitializedBody(id))?;
        let state = data
            .links
            .get(index)
            .ok_or(PhysicsError::LinkOutOfRange { index })?;
        if !state.dynamic {
            return Ok((Vector3::zeros(), Vector3::zeros()));
        }
        let rb = &self.space.bodies()[state.body];
        let angular = *rb.angvel();
        let com_arm = link.transform().rotation * link.com_offset();
        let linear = rb.linvel() - angular.cross(&com_arm);
        Ok((linear, angular))
    }

    /// Read every link's velocity, indexed like the body's links.
    pub fn body_velocities(
        &mut self,
        scene: &Scene,
        id: BodyId,
    ) -> Result<Vec<(Vector3<f32>, Vector3<f32>)>, PhysicsError> {
        self.space.synchronize_body(scene, id);
        let body = scene.body(id).ok_or(PhysicsError::UnknownBody(id))?;
        let data = self
            .space
            .body_data(id)
            .ok_or(PhysicsError::UninitializedBody(id))?;

        let mut velocities = Vec::with_capacity(body.links().len());
        for (link, state) in body.links().iter().zip(&data.links) {
            if !state.dynamic {
                velocities.push((Vector3::zeros(), Vector3::zeros()));
                continue;
            }
            let rb = &self.space.bodies()[state.body];
            let angular = *rb.angvel();
            let com_arm = link.transform().rotation * link.com_offset();
            velocities.push((rb.linvel() - angular.cross(&com_arm), angular));
        }
        Ok(velocities)
    }

    // -- force accessors ----------------------------------------------------

    /// Read the solver-reported force and torque accumulated on a link this
    /// step. Links without dynamics report zeros.
    pub fn link_force_torque(
        &mut self,
        scene: &Scene,
        id: BodyId,
        index: usize,
    ) -> Result<(Vector3<f32>, Vector3<f32>), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let data = self
            .space
            .body_data(id)
            .ok_or(PhysicsError::UninitializedBody(id))?;
        let state = data
            .links
            .get(index)
            .ok_or(PhysicsError::LinkOutOfRange { index })?;
        if !state.dynamic {
            return Ok((Vector3::zeros(), Vector3::zeros()));
        }
        let rb = &self.space.bodies()[state.body];
        Ok((rb.user_force(), rb.user_torque()))
    }

    /// Apply a force to a link at a world-space position.
    ///
    /// With `add = false` the link's force accumulator is replaced, though
    /// the torque induced by the lever arm still accumulates.
    pub fn set_link_force(
        &mut self,
        scene: &Scene,
        id: BodyId,
        index: usize,
        force: Vector3<f32>,
        position: Point3<f32>,
        add: bool,
    ) -> Result<(), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let handle = self.dynamic_handle(id, index)?;
        let rb = self
            .space
            .bodies_mut()
            .get_mut(handle)
            .ok_or(PhysicsError::NoDynamicBody)?;
        if !add {
            rb.reset_forces(true);
        }
        rb.add_force_at_point(force, position, true);
        Ok(())
    }

    /// Apply a torque to a link, replacing or adding to its accumulator.
    pub fn set_link_torque(
        &mut self,
        scene: &Scene,
        id: BodyId,
        index: usize,
        torque: Vector3<f32>,
        add: bool,
    ) -> Result<(), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let handle = self.dynamic_handle(id, index)?;
        let rb = self
            .space
            .bodies_mut()
            .get_mut(handle)
            .ok_or(PhysicsError::NoDynamicBody)?;
        if !add {
            rb.reset_torques(true);
        }
        rb.add_torque(torque, true);
        Ok(())
    }

    // -- joint accessors ----------------------------------------------------

    /// Apply one actuation input per joint DOF.
    ///
    /// Ball joints have no actuation primitive in the solver; the call is
    /// logged and degrades to a no-op rather than failing the caller.
    pub fn add_joint_torque(
        &mut self,
        scene: &Scene,
        id: BodyId,
        joint_index: usize,
        torques: &[f32],
    ) -> Result<(), PhysicsError> {
        self.space.synchronize_body(scene, id);
        let body = scene.body(id).ok_or(PhysicsError::UnknownBody(id))?;
        let joint = body
            .joint(joint_index)
            .ok_or(PhysicsError::JointOutOfRange { index: joint_index })?;
        let expected = joint.kind().dof();
        if torques.len() != expected {
            return Err(PhysicsError::DofMismatch {
                expected,
                got: torques.len(),
            });
        }
        let state = self
            .space
            .joint_state(id, joint_index)
            .ok_or(PhysicsError::UninitializedBody(id))?;
        if joint.kind() == JointKind::Ball {
            warn!(joint = joint.name(), "ball joints cannot be actuated; torque dropped");
            return Ok(());
        }
        let (parent, child) = (state.parent_body, state.child_body);
        let axes = actuation::world_axes(self.space.bodies(), parent, joint);
        actuation::apply_actuation(
            self.space.bodies_mut(),
            joint.kind(),
            parent,
            child,
            &axes,
            torques,
        );
        Ok(())
    }

    /// Read one scalar rate per joint DOF. Ball joints report three zeros.
    pub fn joint_velocity(
        &mut self,
        scene: &Scene,
        id: BodyId,
        joint_index: usize,
    ) -> Result<Vec<f32>, PhysicsError> {
        self.space.synchronize_body(scene, id);
        let body = scene.body(id).ok_or(PhysicsError::UnknownBody(id))?;
        let joint = body
            .joint(joint_index)
            .ok_or(PhysicsError::JointOutOfRange { index: joint_index })?;
        let state = self
            .space
            .joint_state(id, joint_index)
            .ok_or(PhysicsError::UninitializedBody(id))?;
        let (parent, child) = (state.parent_body, state.child_body);
        let axes = actuation::world_axes(self.space.bodies(), parent, joint);
        Ok(actuation::read_velocities(
            self.space.bodies(),
            joint.kind(),
            parent,
            child,
            &axes,
        ))
    }

    // -- stepping -----------------------------------------------------------

    /// Advance the simulation by one full step of `dt` seconds.
    ///
    /// Synchronizes pending scene changes into the solver, runs collision
    /// detection with the near-phase filter (contact reports flow to any
    /// registered callbacks, which may suppress pairs), steps the solver,
    /// and writes resulting poses back into the scene.
    pub fn simulate_step(&mut self, scene: &mut Scene, dt: f32) {
        self.space.synchronize(scene);

        {
            let filter = NearPhaseFilter {
                scene,
                options: self.options,
                friction: self.global_friction,
                callbacks: &self.callbacks,
                report: &self.report,
            };
            self.space.step(&self.gravity, dt, &filter);
        }

        self.space.write_back(scene);
    }

    /// Number of collider pairs with an active contact after the last step.
    pub fn active_contact_pairs(&self) -> usize {
        self.space.active_contact_pairs()
    }

    // -- helpers ------------------------------------------------------------

    fn dynamic_handle(&self, id: BodyId, index: usize) -> Result<RigidBodyHandle, PhysicsError> {
        let data = self
            .space
            .body_data(id)
            .ok_or(PhysicsError::UninitializedBody(id))?;
        let state = data
            .links
            .get(index)
            .ok_or(PhysicsError::LinkOutOfRange { index })?;
        if state.dynamic {
            Ok(state.body)
        } else {
            Err(PhysicsError::NoDynamicBody)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
