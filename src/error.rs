//! Error types for the memory model, codelets and the mind supervisor.

use thiserror::Error;

use crate::mind::MindState;

/// Errors raised by a single memory object.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The supplied activation lies outside the object's bounds.
    #[error("activation {activation} for memory '{name}' is outside [{min}, {max}]")]
    ActivationOutOfBounds {
        name: String,
        activation: f64,
        min: f64,
        max: f64,
    },

    /// The mind was shut down; the object no longer accepts writes.
    #[error("memory '{name}' is closed")]
    MemoryClosed { name: String },

    /// The stored payload could not be decoded into the requested type.
    #[error("memory '{name}' holds an incompatible payload: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while constructing or ticking a codelet.
#[derive(Debug, Error)]
pub enum CodeletError {
    /// Declared activation bounds are inconsistent.
    #[error("codelet '{codelet}': default activation {default} is outside [{min}, {max}]")]
    ActivationOutOfBounds {
        codelet: String,
        min: f64,
        default: f64,
        max: f64,
    },

    /// Two proposals for the same effector could not be arbitrated.
    #[error("motor '{motor}' received conflicting commands from {producers:?}")]
    ConflictingMotorWrite { motor: String, producers: Vec<String> },

    /// A bound memory object rejected an operation.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The role logic supplied by the caller failed.
    #[error("codelet '{codelet}' logic failed: {source}")]
    Logic {
        codelet: String,
        #[source]
        source: anyhow::Error,
    },

    /// The role logic panicked during a tick.
    #[error("codelet '{codelet}' panicked: {message}")]
    Panicked { codelet: String, message: String },
}

impl CodeletError {
    pub(crate) fn logic(codelet: &str, source: anyhow::Error) -> Self {
        Self::Logic {
            codelet: codelet.to_string(),
            source,
        }
    }

    /// Whether the error means the mind is shutting down.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Memory(MemoryError::MemoryClosed { .. }))
    }
}

/// Errors raised by the mind supervisor.
#[derive(Debug, Error)]
pub enum MindError {
    /// A declared dependency identifier matches no output at its layer.
    #[error("codelet '{codelet}' depends on unknown identifier '{dependency}'")]
    UnresolvedDependency { codelet: String, dependency: String },

    /// Two codelets share an identifier.
    #[error("duplicate codelet id: {0}")]
    DuplicateCodeletId(String),

    /// Two memory objects would share a name.
    #[error("duplicate memory name: {0}")]
    DuplicateMemoryName(String),

    /// The operation is not valid in the mind's current lifecycle state.
    #[error("cannot {operation} a mind in state {state}")]
    InvalidState {
        operation: &'static str,
        state: MindState,
    },

    /// No codelet with this identifier is mounted.
    #[error("unknown codelet: {0}")]
    UnknownCodelet(String),

    /// The codelet runtime could not be built.
    #[error("failed to build codelet runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
