//! Integration tests for near-phase pair filtering: adjacency exemption,
//! self-collision gating, and the static-static skip.

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Vector3};

use kinesim_physics::prelude::*;
use kinesim_scene::{BodyId, CollisionShape, Link, Scene, SceneBody};

fn overlapping_sphere(name: &str, z: f32) -> Link {
    Link::new(name)
        .with_mass(1.0)
        .with_inertia(Vector3::new(0.004, 0.004, 0.004))
        .with_shape(CollisionShape::sphere(0.1))
        .with_transform(Isometry3::translation(0.0, 0.0, z))
}

/// One body with two overlapping dynamic sphere links, 0.05m apart.
fn two_overlapping_links() -> (Scene, BodyId) {
    let mut scene = Scene::new();
    let mut body = SceneBody::new("pair");
    body.add_link(overlapping_sphere("a", 0.0));
    body.add_link(overlapping_sphere("b", 0.05));
    let id = scene.add_body(body);
    (scene, id)
}

fn static_sphere_body(name: &str, z: f32) -> SceneBody {
    let mut body = SceneBody::new(name);
    body.add_link(
        Link::new("anchor")
            .with_shape(CollisionShape::sphere(0.2))
            .with_transform(Isometry3::translation(0.0, 0.0, z)),
    );
    body
}

#[test]
fn non_adjacent_same_body_links_collide_when_self_collision_on() {
    let (mut scene, _) = two_overlapping_links();
    let mut engine = PhysicsEngine::default(); // self-collision on by default
    engine.init_environment(&scene).unwrap();

    engine.simulate_step(&mut scene, 0.01);
    assert!(
        engine.active_contact_pairs() > 0,
        "overlapping non-adjacent links should contact"
    );
}

#[test]
fn adjacent_links_never_generate_contacts() {
    let (mut scene, id) = two_overlapping_links();
    scene.body_mut(id).unwrap().set_adjacent(0, 1);

    let mut engine = PhysicsEngine::default();
    engine.init_environment(&scene).unwrap();

    for _ in 0..10 {
        engine.simulate_step(&mut scene, 0.01);
        assert_eq!(engine.active_contact_pairs(), 0);
    }
}

#[test]
fn self_collision_bit_gates_same_body_pairs() {
    let (mut scene, _) = two_overlapping_links();
    let config = PhysicsConfig {
        selfcollision: false,
        ..PhysicsConfig::default()
    };
    let mut engine = PhysicsEngine::new(&config);
    engine.init_environment(&scene).unwrap();

    for _ in 0..10 {
        engine.simulate_step(&mut scene, 0.01);
        assert_eq!(engine.active_contact_pairs(), 0);
    }
}

#[test]
fn static_static_pairs_do_no_solver_work() {
    let mut scene = Scene::new();
    // heavily overlapping static bodies
    scene.add_body(static_sphere_body("s1", 0.0));
    scene.add_body(static_sphere_body("s2", 0.1));

    let mut engine = PhysicsEngine::default();
    engine.init_environment(&scene).unwrap();

    let invocations = std::rc::Rc::new(std::cell::Cell::new(0u32));
    let seen = std::rc::Rc::clone(&invocations);
    engine.register_collision_callback(Box::new(move |_| {
        seen.set(seen.get() + 1);
        CollisionAction::DefaultAction
    }));

    for _ in 0..10 {
        engine.simulate_step(&mut scene, 0.01);
    }
    assert_eq!(engine.active_contact_pairs(), 0);
    assert_eq!(invocations.get(), 0, "no callback should fire for statics");
}

#[test]
fn disabled_body_generates_no_contacts() {
    let mut scene = Scene::new();
    let ground = {
        let mut body = SceneBody::new("ground");
        body.add_link(Link::new("slab").with_shape(CollisionShape::cuboid(2.0, 2.0, 0.1)));
        scene.add_body(body)
    };
    let mut ball = SceneBody::new("ball");
    ball.add_link(overlapping_sphere("b", 0.15));
    scene.add_body(ball);

    scene.body_mut(ground).unwrap().set_enabled(false);

    let mut engine = PhysicsEngine::default();
    engine.init_environment(&scene).unwrap();

    for _ in 0..10 {
        engine.simulate_step(&mut scene, 0.01);
        assert_eq!(engine.active_contact_pairs(), 0);
    }
}

#[test]
fn dynamic_body_rests_on_static_ground() {
    let mut scene = Scene::new();
    let mut ground = SceneBody::new("ground");
    ground.add_link(Link::new("slab").with_shape(CollisionShape::cuboid(2.0, 2.0, 0.1)));
    scene.add_body(ground);
    let mut ball = SceneBody::new("ball");
    ball.add_link(overlapping_sphere("b", 0.25));
    let ball_id = scene.add_body(ball);

    let mut engine = PhysicsEngine::default();
    engine.init_environment(&scene).unwrap();

    for _ in 0..150 {
        engine.simulate_step(&mut scene, 0.01);
    }

    assert!(engine.active_contact_pairs() > 0, "ball should rest in contact");
    let (linear, _) = engine.link_velocity(&scene, ball_id, 0).unwrap();
    eprintln!("resting velocity: {linear:?}");
    assert_relative_eq!(linear.z, 0.0, epsilon = 0.2);
    let z = scene.body(ball_id).unwrap().link(0).unwrap().transform().translation.z;
    assert!(z > 0.1, "ball should not sink through the ground: z={z}");
}
