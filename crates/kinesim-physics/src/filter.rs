//! Near-phase collision filtering and contact routing.
//!
//! The solver's broad phase proposes candidate collider pairs; the filter
//! decides which pairs may generate contacts (adjacency, self-collision
//! policy, disabled and static entities) and the contact-modification hook
//! routes resulting contacts through the registered collision callbacks
//! before they reach the constraint solver.

use std::cell::RefCell;

use rapier3d::prelude::{
    ContactModificationContext, PairFilterContext, PhysicsHooks, RigidBodyHandle, SolverFlags,
};

use kinesim_scene::{BodyId, Scene};

use crate::config::PhysicsOptions;
use crate::report::{
    CallbackRegistry, CollisionAction, CollisionReport, ContactPoint, LinkRef, MAX_CONTACTS,
};

// ---------------------------------------------------------------------------
// Collider user-data packing
// ---------------------------------------------------------------------------

/// Pack a link reference into collider user data for O(1) resolution from
/// solver callbacks back to the scene.
pub(crate) fn pack_link_ref(body: BodyId, link: usize) -> u128 {
    u128::from(body.raw()) | ((link as u128) << 32)
}

pub(crate) fn unpack_link_ref(data: u128) -> LinkRef {
    LinkRef {
        body: BodyId((data & 0xffff_ffff) as u32),
        link: ((data >> 32) & 0xffff_ffff) as usize,
    }
}

// ---------------------------------------------------------------------------
// NearPhaseFilter
// ---------------------------------------------------------------------------

/// Per-step collision filter built over the scene and engine parameters.
///
/// Constructed by the step driver for the duration of one solver step. The
/// report buffer is the engine's scratch value, reset per filtered pair; it
/// is not shared between threads.
pub(crate) struct NearPhaseFilter<'a> {
    pub scene: &'a Scene,
    pub options: PhysicsOptions,
    pub friction: f32,
    pub callbacks: &'a CallbackRegistry,
    pub report: &'a RefCell<CollisionReport>,
}

impl NearPhaseFilter<'_> {
    /// Decide whether a resolved link pair may generate contacts.
    ///
    /// `dynamic1`/`dynamic2` reflect whether each side currently has an
    /// enabled dynamic rigid body in the solver.
    fn evaluate_pair(&self, l1: LinkRef, l2: LinkRef, dynamic1: bool, dynamic2: bool) -> bool {
        let Some(body1) = self.scene.body(l1.body) else {
            return false;
        };
        let Some(body2) = self.scene.body(l2.body) else {
            return false;
        };

        let self_collision = self.options.contains(PhysicsOptions::SELF_COLLISION);

        // Joint-connected links never collide while self-collision is off.
        if !self_collision && l1.body == l2.body && body1.joint_between(l1.link, l2.link) {
            return false;
        }

        // Static-static pairs do no solver work.
        if !dynamic1 && !dynamic2 {
            return false;
        }

        // Administratively disabled bodies and links generate nothing.
        if !body1.enabled() || !body2.enabled() {
            return false;
        }
        let (Some(link1), Some(link2)) = (body1.link(l1.link), body2.link(l2.link)) else {
            return false;
        };
        if !link1.enabled() || !link2.enabled() {
            return false;
        }

        // Same-body pairs: gated by the self-collision bit, meaningful only
        // for multi-link bodies, with adjacent pairs always exempt.
        if l1.body == l2.body {
            if !self_collision || body1.links().len() <= 1 {
                return false;
            }
            if body1.are_adjacent(l1.link, l2.link) {
                return false;
            }
        }

        true
    }

    fn is_dynamic(context: &PairFilterContext, handle: Option<RigidBodyHandle>) -> bool {
        handle
            .and_then(|h| context.bodies.get(h))
            .is_some_and(|rb| rb.is_dynamic() && rb.is_enabled())
    }
}

impl PhysicsHooks for NearPhaseFilter<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let collider1 = context.colliders.get(context.collider1)?;
        let collider2 = context.colliders.get(context.collider2)?;
        if !collider1.is_enabled() || !collider2.is_enabled() {
            return None;
        }

        let l1 = unpack_link_ref(collider1.user_data);
        let l2 = unpack_link_ref(collider2.user_data);
        let dynamic1 = Self::is_dynamic(context, context.rigid_body1);
        let dynamic2 = Self::is_dynamic(context, context.rigid_body2);

        self.evaluate_pair(l1, l2, dynamic1, dynamic2)
            .then_some(SolverFlags::COMPUTE_IMPULSES)
    }

    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        if context.solver_contacts.is_empty() {
            return;
        }
        context.solver_contacts.truncate(MAX_CONTACTS);

        if !self.callbacks.is_empty() {
            let mut report = self.report.borrow_mut();
            report.reset();
            if let (Some(c1), Some(c2)) = (
                context.colliders.get(context.collider1),
                context.colliders.get(context.collider2),
            ) {
                report.link1 = Some(unpack_link_ref(c1.user_data));
                report.link2 = Some(unpack_link_ref(c2.user_data));
            }
            // The manifold normal points from the first collider toward the
            // second, which matches the report's link order.
            let normal = *context.normal;
            for sc in context.solver_contacts.iter() {
                report.push_contact(ContactPoint {
                    position: sc.point,
                    normal,
                    depth: (-sc.dist).max(0.0),
                });
            }

            for callback in self.callbacks.iter() {
                if callback(&report) != CollisionAction::DefaultAction {
                    // A non-default verdict aborts default processing: no
                    // contact constraints for this pair.
                    context.solver_contacts.clear();
                    return;
                }
            }
        }

        // Flat Coulomb friction, no bounce, no softness or slip.
        for sc in context.solver_contacts.iter_mut() {
            sc.friction = self.friction;
            sc.restitution = 0.0;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kinesim_scene::{Joint, JointKind, Link, SceneBody};

    fn link_ref(body: u32, link: usize) -> LinkRef {
        LinkRef {
            body: BodyId(body),
            link,
        }
    }

    fn filter_over<'a>(
        scene: &'a Scene,
        options: PhysicsOptions,
        callbacks: &'a CallbackRegistry,
        report: &'a RefCell<CollisionReport>,
    ) -> NearPhaseFilter<'a> {
        NearPhaseFilter {
            scene,
            options,
            friction: 1.0,
            callbacks,
            report,
        }
    }

    fn two_body_scene() -> Scene {
        let mut scene = Scene::new();
        for name in ["a", "b"] {
            let mut body = SceneBody::new(name);
            body.add_link(Link::new("l0").with_mass(1.0));
            body.add_link(Link::new("l1").with_mass(1.0));
            scene.add_body(body);
        }
        scene
    }

    // -- user data packing --

    #[test]
    fn link_ref_round_trips_through_user_data() {
        let packed = pack_link_ref(BodyId(42), 7);
        let unpacked = unpack_link_ref(packed);
        assert_eq!(unpacked, link_ref(42, 7));
    }

    #[test]
    fn link_ref_extremes() {
        let packed = pack_link_ref(BodyId(u32::MAX), 0xffff);
        let unpacked = unpack_link_ref(packed);
        assert_eq!(unpacked.body, BodyId(u32::MAX));
        assert_eq!(unpacked.link, 0xffff);
    }

    // -- pair evaluation --

    #[test]
    fn cross_body_dynamic_pair_passes() {
        let scene = two_body_scene();
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());
        let filter = filter_over(&scene, PhysicsOptions::default(), &callbacks, &report);
        assert!(filter.evaluate_pair(link_ref(0, 0), link_ref(1, 0), true, true));
    }

    #[test]
    fn static_static_pair_skipped() {
        let scene = two_body_scene();
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());
        let filter = filter_over(&scene, PhysicsOptions::default(), &callbacks, &report);
        assert!(!filter.evaluate_pair(link_ref(0, 0), link_ref(1, 0), false, false));
        // one dynamic side is enough
        assert!(filter.evaluate_pair(link_ref(0, 0), link_ref(1, 0), true, false));
    }

    #[test]
    fn disabled_body_pair_skipped() {
        let mut scene = two_body_scene();
        scene.body_mut(BodyId(1)).unwrap().set_enabled(false);
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());
        let filter = filter_over(&scene, PhysicsOptions::default(), &callbacks, &report);
        assert!(!filter.evaluate_pair(link_ref(0, 0), link_ref(1, 0), true, true));
    }

    #[test]
    fn disabled_link_pair_skipped() {
        let mut scene = two_body_scene();
        scene
            .body_mut(BodyId(0))
            .unwrap()
            .set_link_enabled(0, false)
            .unwrap();
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());
        let filter = filter_over(&scene, PhysicsOptions::default(), &callbacks, &report);
        assert!(!filter.evaluate_pair(link_ref(0, 0), link_ref(1, 0), true, true));
    }

    #[test]
    fn same_body_gated_by_self_collision_bit() {
        let scene = two_body_scene();
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());

        let enabled = filter_over(&scene, PhysicsOptions::SELF_COLLISION, &callbacks, &report);
        assert!(enabled.evaluate_pair(link_ref(0, 0), link_ref(0, 1), true, true));

        let disabled = filter_over(&scene, PhysicsOptions::empty(), &callbacks, &report);
        assert!(!disabled.evaluate_pair(link_ref(0, 0), link_ref(0, 1), true, true));
    }

    #[test]
    fn adjacent_links_never_collide() {
        let mut scene = two_body_scene();
        scene.body_mut(BodyId(0)).unwrap().set_adjacent(0, 1);
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());
        let filter = filter_over(&scene, PhysicsOptions::SELF_COLLISION, &callbacks, &report);
        assert!(!filter.evaluate_pair(link_ref(0, 0), link_ref(0, 1), true, true));
    }

    #[test]
    fn joint_connected_links_skipped_when_self_collision_off() {
        let mut scene = two_body_scene();
        {
            let body = scene.body_mut(BodyId(0)).unwrap();
            body.add_joint(Joint::new("j", JointKind::Hinge, 0, 1)).unwrap();
            // drop the automatic adjacency so only the joint check applies
            body.clear_adjacent(0, 1);
        }
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());

        let off = filter_over(&scene, PhysicsOptions::empty(), &callbacks, &report);
        assert!(!off.evaluate_pair(link_ref(0, 0), link_ref(0, 1), true, true));

        // with self-collision on, the joint alone does not exempt the pair
        let on = filter_over(&scene, PhysicsOptions::SELF_COLLISION, &callbacks, &report);
        assert!(on.evaluate_pair(link_ref(0, 0), link_ref(0, 1), true, true));
    }

    #[test]
    fn unknown_body_skipped() {
        let scene = Scene::new();
        let callbacks = CallbackRegistry::default();
        let report = RefCell::new(CollisionReport::new());
        let filter = filter_over(&scene, PhysicsOptions::default(), &callbacks, &report);
        assert!(!filter.evaluate_pair(link_ref(0, 0), link_ref(1, 0), true, true));
    }
}
