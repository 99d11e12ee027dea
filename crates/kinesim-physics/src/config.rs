//! Global simulation parameters and the options bitmask.

use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_friction() -> f32 {
    1.0
}
const fn default_selfcollision() -> bool {
    true
}
const fn default_gravity() -> [f32; 3] {
    [0.0, 0.0, -9.81]
}

// ---------------------------------------------------------------------------
// PhysicsOptions
// ---------------------------------------------------------------------------

bitflags! {
    /// Engine option bitmask.
    ///
    /// Only the self-collision bit is interpreted here; unknown bits are
    /// preserved round-trip so callers can stash extension flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PhysicsOptions: u32 {
        /// Evaluate collisions between non-adjacent links of the same body.
        const SELF_COLLISION = 1;
    }
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self::SELF_COLLISION
    }
}

// ---------------------------------------------------------------------------
// PhysicsConfig
// ---------------------------------------------------------------------------

/// Structured configuration payload accepted at engine construction.
///
/// The serde derive is strict (unknown fields are a deserialization error);
/// [`PhysicsConfig::from_toml_str`] implements the lenient key-by-key path
/// where a malformed value is logged and skipped while siblings still apply,
/// and an unrecognized key is logged and surfaced as a hard error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysicsConfig {
    /// Flat Coulomb friction coefficient applied to every contact.
    #[serde(default = "default_friction")]
    pub friction: f32,

    /// Whether links of the same body may collide (non-adjacent pairs only).
    #[serde(default = "default_selfcollision")]
    pub selfcollision: bool,

    /// Gravity vector [x, y, z] in m/s^2.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            friction: default_friction(),
            selfcollision: default_selfcollision(),
            gravity: default_gravity(),
        }
    }
}

impl PhysicsConfig {
    /// Option bitmask corresponding to this configuration.
    pub fn options(&self) -> PhysicsOptions {
        if self.selfcollision {
            PhysicsOptions::SELF_COLLISION
        } else {
            PhysicsOptions::empty()
        }
    }

    /// Load from a TOML file via the lenient parser.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a TOML document key by key.
    ///
    /// Malformed values are logged as warnings and skipped. All recognized
    /// siblings are applied before an unrecognized key is reported.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = input.parse()?;
        Self::from_table(&table)
    }

    fn from_table(table: &toml::Table) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut unrecognized: Option<String> = None;

        for (key, value) in table {
            match key.as_str() {
                "friction" => match toml_number(value) {
                    Some(v) => config.friction = v,
                    None => warn!(%value, "ignoring malformed friction value"),
                },
                "selfcollision" => match value.as_bool() {
                    Some(v) => config.selfcollision = v,
                    None => warn!(%value, "ignoring malformed selfcollision value"),
                },
                "gravity" => match toml_vec3(value) {
                    Some(v) => config.gravity = v,
                    None => warn!(%value, "ignoring malformed gravity value"),
                },
                other => {
                    error!(key = other, "unrecognized physics parameter");
                    unrecognized.get_or_insert_with(|| other.to_owned());
                }
            }
        }

        match unrecognized {
            Some(key) => Err(ConfigError::UnrecognizedKey(key)),
            None => Ok(config),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn toml_number(value: &toml::Value) -> Option<f32> {
    match value {
        toml::Value::Float(v) => Some(*v as f32),
        toml::Value::Integer(v) => Some(*v as f32),
        _ => None,
    }
}

fn toml_vec3(value: &toml::Value) -> Option<[f32; 3]> {
    let array = value.as_array()?;
    if array.len() != 3 {
        return None;
    }
    let mut out = [0.0; 3];
    for (slot, item) in out.iter_mut().zip(array) {
        *slot = toml_number(item)?;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
