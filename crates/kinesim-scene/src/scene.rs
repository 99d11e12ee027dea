//! The scene: an addressable collection of bodies.

use std::fmt;

use crate::body::SceneBody;

// ---------------------------------------------------------------------------
// BodyId
// ---------------------------------------------------------------------------

/// Stable identifier of a body within a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// The scene graph root: owns every body.
///
/// Bodies are never removed once added, so a [`BodyId`] stays valid for the
/// scene's lifetime. Solver-side state for a body lives in the physics
/// crate's side-table, keyed by this id; the scene never owns solver state.
#[derive(Debug, Default)]
pub struct Scene {
    bodies: Vec<SceneBody>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body, returning its id.
    pub fn add_body(&mut self, body: SceneBody) -> BodyId {
        self.bodies.push(body);
        BodyId(self.bodies.len() as u32 - 1)
    }

    pub fn body(&self, id: BodyId) -> Option<&SceneBody> {
        self.bodies.get(id.0 as usize)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut SceneBody> {
        self.bodies.get_mut(id.0 as usize)
    }

    /// Iterate over all bodies with their ids.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &SceneBody)> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(i, b)| (BodyId(i as u32), b))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut scene = Scene::new();
        let a = scene.add_body(SceneBody::new("a"));
        let b = scene.add_body(SceneBody::new("b"));
        assert_ne!(a, b);
        assert_eq!(scene.body(a).unwrap().name(), "a");
        assert_eq!(scene.body(b).unwrap().name(), "b");
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn missing_body_is_none() {
        let scene = Scene::new();
        assert!(scene.body(BodyId(0)).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn bodies_iterates_in_insertion_order() {
        let mut scene = Scene::new();
        scene.add_body(SceneBody::new("first"));
        scene.add_body(SceneBody::new("second"));
        let names: Vec<&str> = scene.bodies().map(|(_, b)| b.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn body_id_display() {
        assert_eq!(BodyId(4).to_string(), "body#4");
    }
}
