use kinesim_scene::BodyId;
use thiserror::Error;

/// Errors from engine accessors and lifecycle operations.
///
/// Absence of a dynamic solver representation is an expected, common case
/// (static and kinematic links), so it is an error value rather than a panic.
/// Divergence between the scene and the solver's cached link state is the one
/// condition treated as fatal, and that is asserted in the step driver, not
/// reported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    #[error("link has no dynamic solver representation")]
    NoDynamicBody,

    #[error("{0} has no solver state (environment or body not initialized)")]
    UninitializedBody(BodyId),

    #[error("unknown body {0}")]
    UnknownBody(BodyId),

    #[error("link index {index} out of range")]
    LinkOutOfRange { index: usize },

    #[error("joint index {index} out of range")]
    JointOutOfRange { index: usize },

    #[error("actuation dimension mismatch: joint has {expected} dof, got {got}")]
    DofMismatch { expected: usize, got: usize },

    #[error("velocity count mismatch: body has {expected} links, got {got}")]
    VelocityCountMismatch { expected: usize, got: usize },

    #[error("solver environment is not initialized")]
    NotInitialized,
}

/// Errors from the physics configuration surface.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unrecognized physics parameter: {0}")]
    UnrecognizedKey(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physics_error_display() {
        assert_eq!(
            PhysicsError::NoDynamicBody.to_string(),
            "link has no dynamic solver representation"
        );
        assert_eq!(
            PhysicsError::UninitializedBody(BodyId(2)).to_string(),
            "body#2 has no solver state (environment or body not initialized)"
        );
        assert_eq!(
            PhysicsError::DofMismatch {
                expected: 2,
                got: 1
            }
            .to_string(),
            "actuation dimension mismatch: joint has 2 dof, got 1"
        );
    }

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::UnrecognizedKey("bounce".into()).to_string(),
            "unrecognized physics parameter: bounce"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                key: "gravity".into(),
                message: "expected an array of 3 numbers".into()
            }
            .to_string(),
            "invalid value for gravity: expected an array of 3 numbers"
        );
    }

    #[test]
    fn config_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io.into();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn physics_error_is_copy() {
        let err = PhysicsError::NoDynamicBody;
        let err2 = err;
        assert_eq!(err, err2);
    }
}
