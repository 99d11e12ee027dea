// kinesim-scene: scene-graph data model for the kinesim physics bridge.
//
// Bodies are ordered collections of rigid links connected by joints. The
// types here are plain data plus bookkeeping (update stamps, adjacency,
// enabled flags); all dynamics live in kinesim-physics, which mirrors this
// model into the solver and writes poses back after each step.

pub mod body;
pub mod error;
pub mod joint;
pub mod link;
pub mod scene;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::body::{adjacency_key, SceneBody};
    pub use crate::error::SceneError;
    pub use crate::joint::{Joint, JointKind};
    pub use crate::link::{CollisionShape, Link, ShapeKind};
    pub use crate::scene::{BodyId, Scene};
}

pub use body::SceneBody;
pub use joint::{Joint, JointKind};
pub use link::{CollisionShape, Link, ShapeKind};
pub use scene::{BodyId, Scene};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
