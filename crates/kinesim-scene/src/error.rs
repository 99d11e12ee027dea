use thiserror::Error;

/// Errors produced while building or mutating a scene body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("link index {index} out of range (body has {count} links)")]
    LinkOutOfRange { index: usize, count: usize },

    #[error("joint index {index} out of range (body has {count} joints)")]
    JointOutOfRange { index: usize, count: usize },

    #[error("joint connects a link to itself (link index {index})")]
    DegenerateJoint { index: usize },
}
