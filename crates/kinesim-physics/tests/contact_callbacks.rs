//! Integration tests for collision report routing: callback invocation,
//! ordering, and contact suppression.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Vector3};

use kinesim_physics::prelude::*;
use kinesim_scene::{BodyId, CollisionShape, Link, Scene, SceneBody};

/// Static ground slab plus a sphere initially penetrating its surface.
fn ground_and_ball() -> (Scene, BodyId, BodyId) {
    let mut scene = Scene::new();
    let mut ground = SceneBody::new("ground");
    ground.add_link(Link::new("slab").with_shape(CollisionShape::cuboid(2.0, 2.0, 0.1)));
    let ground_id = scene.add_body(ground);

    let mut ball = SceneBody::new("ball");
    ball.add_link(
        Link::new("b")
            .with_mass(1.0)
            .with_inertia(Vector3::new(0.004, 0.004, 0.004))
            .with_shape(CollisionShape::sphere(0.1))
            .with_transform(Isometry3::translation(0.0, 0.0, 0.15)),
    );
    let ball_id = scene.add_body(ball);
    (scene, ground_id, ball_id)
}

fn engine_98() -> PhysicsEngine {
    PhysicsEngine::new(&PhysicsConfig {
        gravity: [0.0, 0.0, -9.8],
        ..PhysicsConfig::default()
    })
}

#[test]
fn suppressing_callback_leaves_bodies_ballistic() {
    let (mut scene, _, ball_id) = ground_and_ball();
    let mut engine = engine_98();
    engine.init_environment(&scene).unwrap();

    let invocations = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&invocations);
    engine.register_collision_callback(Box::new(move |_| {
        seen.set(seen.get() + 1);
        CollisionAction::Suppress
    }));

    for _ in 0..10 {
        engine.simulate_step(&mut scene, 0.01);
    }

    assert!(invocations.get() > 0, "callback should have been offered the pair");
    let (linear, _) = engine.link_velocity(&scene, ball_id, 0).unwrap();
    eprintln!("velocity with suppressed contacts: {linear:?}");
    // no contact impulses: pure gravity for 0.1s
    assert_relative_eq!(linear.z, -0.98, epsilon = 1e-2);
}

#[test]
fn default_action_callback_observes_contacts_and_keeps_physics() {
    let (mut scene, ground_id, ball_id) = ground_and_ball();
    let mut engine = engine_98();
    engine.init_environment(&scene).unwrap();

    let captured: Rc<RefCell<Option<(LinkRef, LinkRef, usize, f32)>>> =
        Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);
    engine.register_collision_callback(Box::new(move |report: &CollisionReport| {
        if let (Some(l1), Some(l2)) = (report.link1, report.link2) {
            let depth = report.contacts.first().map_or(0.0, |c| c.depth);
            *sink.borrow_mut() = Some((l1, l2, report.contacts.len(), depth));
        }
        CollisionAction::DefaultAction
    }));

    for _ in 0..100 {
        engine.simulate_step(&mut scene, 0.01);
    }

    let captured = captured.borrow();
    let (l1, l2, count, depth) = captured.expect("callback should have captured a report");
    let pair = [l1.body, l2.body];
    assert!(pair.contains(&ground_id) && pair.contains(&ball_id));
    assert!(count > 0 && count <= MAX_CONTACTS);
    assert!(depth >= 0.0, "penetration depth is non-negative: {depth}");

    // default processing still ran: the ball rests instead of falling through
    let (linear, _) = engine.link_velocity(&scene, ball_id, 0).unwrap();
    assert_relative_eq!(linear.z, 0.0, epsilon = 0.2);
}

#[test]
fn callbacks_run_in_registration_order_until_suppressed() {
    let (mut scene, _, _) = ground_and_ball();
    let mut engine = engine_98();
    engine.init_environment(&scene).unwrap();

    let first = Rc::new(Cell::new(0u32));
    let second = Rc::new(Cell::new(0u32));

    let c1 = Rc::clone(&first);
    engine.register_collision_callback(Box::new(move |_| {
        c1.set(c1.get() + 1);
        CollisionAction::Suppress
    }));
    let c2 = Rc::clone(&second);
    engine.register_collision_callback(Box::new(move |_| {
        c2.set(c2.get() + 1);
        CollisionAction::DefaultAction
    }));

    for _ in 0..5 {
        engine.simulate_step(&mut scene, 0.01);
    }

    assert!(first.get() > 0);
    assert_eq!(
        second.get(),
        0,
        "a suppressing verdict must end processing for the pair"
    );
}

#[test]
fn unregistered_callback_no_longer_fires() {
    let (mut scene, _, _) = ground_and_ball();
    let mut engine = engine_98();
    engine.init_environment(&scene).unwrap();

    let invocations = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&invocations);
    let id = engine.register_collision_callback(Box::new(move |_| {
        seen.set(seen.get() + 1);
        CollisionAction::DefaultAction
    }));

    engine.simulate_step(&mut scene, 0.01);
    let after_first = invocations.get();
    assert!(after_first > 0);

    assert!(engine.unregister_collision_callback(id));
    engine.simulate_step(&mut scene, 0.01);
    assert_eq!(invocations.get(), after_first);
}
