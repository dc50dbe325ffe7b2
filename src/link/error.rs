use thiserror::Error;

use super::spec::ParseError;

/// Why a link could not be created. Each failure is scoped to the one
/// creation attempt; nothing is left half-bound.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("No UI loaded.")]
    NoTree,

    #[error("Invalid root or object.")]
    InvalidObject,

    #[error("Object '{name}' not found.")]
    ObjectNotFound { name: String },

    #[error("Property '{attribute}' not found on '{object}' ({class}).")]
    AttributeNotFound {
        attribute: String,
        object: String,
        class: String,
    },

    #[error("Property '{attribute}' on '{object}' must be readable & writable.")]
    AttributeNotBindable { attribute: String, object: String },
}
