// kinesim-physics: bridge between the kinesim scene graph and the rapier3d
// rigid-body solver.
//
// The engine keeps the solver's rigid-body representation synchronized with
// the scene graph, converts joint and link operations into solver primitives,
// filters collisions (adjacency, self-collision policy, disabled and static
// entities), routes contact reports to registered callbacks, steps the
// solver, and writes resulting poses back into the scene.
//
// Single-threaded by design: one `simulate_step` fully completes before
// returning, and all mutable state is owned by the engine for the duration
// of a call.

mod actuation;
pub mod config;
pub mod engine;
pub mod error;
mod filter;
pub mod report;
pub mod space;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::config::{PhysicsConfig, PhysicsOptions};
    pub use crate::engine::PhysicsEngine;
    pub use crate::error::{ConfigError, PhysicsError};
    pub use crate::report::{
        CallbackId, CollisionAction, CollisionCallback, CollisionReport, ContactPoint, LinkRef,
        MAX_CONTACTS,
    };
    pub use crate::space::SolverSpace;
}

pub use config::{PhysicsConfig, PhysicsOptions};
pub use engine::PhysicsEngine;
pub use error::{ConfigError, PhysicsError};
pub use report::{CollisionAction, CollisionReport};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
