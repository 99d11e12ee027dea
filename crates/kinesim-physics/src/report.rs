//! Collision reports and the external callback registry.

use nalgebra::{Point3, Vector3};

use kinesim_scene::BodyId;

/// Narrow-phase contact buffer cap per colliding pair.
pub const MAX_CONTACTS: usize = 16;

// ---------------------------------------------------------------------------
// ContactPoint / LinkRef
// ---------------------------------------------------------------------------

/// A single contact between two links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World-space contact position.
    pub position: Point3<f32>,
    /// World-space contact normal, pointing from the report's first link
    /// toward the second.
    pub normal: Vector3<f32>,
    /// Penetration depth (non-negative).
    pub depth: f32,
}

/// Identifies one link of one scene body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkRef {
    pub body: BodyId,
    pub link: usize,
}

// ---------------------------------------------------------------------------
// CollisionReport
// ---------------------------------------------------------------------------

/// Transient record of one colliding pair, offered to registered callbacks.
///
/// The engine keeps a single report as a scratch value and resets it at the
/// start of every pair that has a callback audience; the contact vector keeps
/// its capacity across pairs. Not shared between threads.
#[derive(Debug, Default)]
pub struct CollisionReport {
    pub link1: Option<LinkRef>,
    pub link2: Option<LinkRef>,
    pub contacts: Vec<ContactPoint>,
}

impl CollisionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the report for reuse, keeping the contact buffer's capacity.
    pub fn reset(&mut self) {
        self.link1 = None;
        self.link2 = None;
        self.contacts.clear();
    }

    /// Append a contact, silently dropping anything past [`MAX_CONTACTS`].
    pub fn push_contact(&mut self, contact: ContactPoint) {
        if self.contacts.len() < MAX_CONTACTS {
            self.contacts.push(contact);
        }
    }
}

// ---------------------------------------------------------------------------
// Collision callbacks
// ---------------------------------------------------------------------------

/// Verdict returned by a collision callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionAction {
    /// Proceed with default contact processing.
    DefaultAction,
    /// Drop the pair: no contact constraints are created.
    Suppress,
}

/// External consumer of collision reports.
pub type CollisionCallback = Box<dyn Fn(&CollisionReport) -> CollisionAction>;

/// Handle for unregistering a collision callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(u64);

/// Ordered registry of collision callbacks.
///
/// Callbacks are offered reports in registration order; the first one that
/// returns [`CollisionAction::Suppress`] ends processing for that pair.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Vec<(CallbackId, CollisionCallback)>,
    next_id: u64,
}

impl CallbackRegistry {
    pub fn register(&mut self, callback: CollisionCallback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unregister(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate callbacks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CollisionCallback> {
        self.entries.iter().map(|(_, cb)| cb)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
