// src/error.rs  -  Typed errors for configuration, layouts and action dispatch
use crate::keyer::KeyRole;
use thiserror::Error;

/// Rejected engine configuration.  Blocks the start / mode change that
/// produced it; the previous configuration (if any) stays in force.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("input arity must be 1, 2 or 3 (got {0})")]
    InvalidArity(u8),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("no physical key bound to the {0} switch")]
    MissingBinding(KeyRole),

    #[error("{first} and {second} switches are both bound to {key}; use different keys")]
    DuplicateBinding {
        first:  KeyRole,
        second: KeyRole,
        key:    String,
    },
}

/// Problems in a layout description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("no layouts defined")]
    Empty,

    #[error("layout '{0}' not found")]
    UnknownLayout(String),

    #[error("layout '{layout}': code '{code}' is not a dit/dah sequence")]
    InvalidCode { layout: String, code: String },

    #[error("layout '{layout}': code '{code}' is bound more than once")]
    DuplicateCode { layout: String, code: String },

    #[error("layout '{layout}': action {action} needs a target")]
    MissingTarget { layout: String, action: String },
}

/// A collaborator failed while an action was performed.  Never fatal:
/// the engine logs it and carries on with the next character.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("input synthesis failed: {0:#}")]
    Synth(anyhow::Error),
}
