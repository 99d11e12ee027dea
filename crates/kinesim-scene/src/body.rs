//! Scene bodies: ordered links, joints, adjacency, and update stamps.

use std::collections::HashSet;

use nalgebra::Isometry3;

use crate::error::SceneError;
use crate::joint::Joint;
use crate::link::Link;

/// Key for a pair of link indices in a body's adjacency set.
///
/// The smaller index occupies the low 16 bits, the larger the next 16.
pub fn adjacency_key(a: usize, b: usize) -> u32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (lo as u32) | ((hi as u32) << 16)
}

// ---------------------------------------------------------------------------
// SceneBody
// ---------------------------------------------------------------------------

/// A body in the scene graph: an ordered set of rigid links connected by
/// joints.
///
/// Every mutation bumps the body's update stamp; the physics bridge compares
/// stamps to decide whether solver state must be refreshed. Links joined by a
/// joint are automatically marked adjacent, which exempts them from contact
/// generation.
#[derive(Debug, Clone)]
pub struct SceneBody {
    name: String,
    links: Vec<Link>,
    joints: Vec<Joint>,
    adjacency: HashSet<u32>,
    enabled: bool,
    update_stamp: u64,
}

impl SceneBody {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
            adjacency: HashSet::new(),
            enabled: true,
            update_stamp: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a link, returning its index.
    pub fn add_link(&mut self, link: Link) -> usize {
        self.links.push(link);
        self.bump();
        self.links.len() - 1
    }

    /// Append a joint, returning its index.
    ///
    /// The joined links are marked adjacent, matching the convention that
    /// permanently connected links never generate contacts between them.
    pub fn add_joint(&mut self, joint: Joint) -> Result<usize, SceneError> {
        let count = self.links.len();
        for index in [joint.parent(), joint.child()] {
            if index >= count {
                return Err(SceneError::LinkOutOfRange { index, count });
            }
        }
        if joint.parent() == joint.child() {
            return Err(SceneError::DegenerateJoint {
                index: joint.parent(),
            });
        }
        self.adjacency
            .insert(adjacency_key(joint.parent(), joint.child()));
        self.joints.push(joint);
        self.bump();
        Ok(self.joints.len() - 1)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    /// Set a link's world transform.
    pub fn set_link_transform(
        &mut self,
        index: usize,
        transform: Isometry3<f32>,
    ) -> Result<(), SceneError> {
        let count = self.links.len();
        let link = self
            .links
            .get_mut(index)
            .ok_or(SceneError::LinkOutOfRange { index, count })?;
        link.set_transform(transform);
        self.bump();
        Ok(())
    }

    /// Enable or disable a single link.
    pub fn set_link_enabled(&mut self, index: usize, enabled: bool) -> Result<(), SceneError> {
        let count = self.links.len();
        let link = self
            .links
            .get_mut(index)
            .ok_or(SceneError::LinkOutOfRange { index, count })?;
        link.set_enabled(enabled);
        self.bump();
        Ok(())
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the whole body.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.bump();
    }

    /// Declare two links permanently touching; the pair is exempt from
    /// contact generation.
    pub fn set_adjacent(&mut self, a: usize, b: usize) {
        self.adjacency.insert(adjacency_key(a, b));
        self.bump();
    }

    /// Remove a pair from the adjacency set.
    pub fn clear_adjacent(&mut self, a: usize, b: usize) {
        self.adjacency.remove(&adjacency_key(a, b));
        self.bump();
    }

    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        self.adjacency.contains(&adjacency_key(a, b))
    }

    /// Whether some joint directly connects the two links.
    pub fn joint_between(&self, a: usize, b: usize) -> bool {
        self.joints.iter().any(|j| {
            (j.parent() == a && j.child() == b) || (j.parent() == b && j.child() == a)
        })
    }

    /// Monotonic counter bumped by every mutation.
    pub const fn update_stamp(&self) -> u64 {
        self.update_stamp
    }

    fn bump(&mut self) {
        self.update_stamp += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
