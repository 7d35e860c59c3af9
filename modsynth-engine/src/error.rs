use std::fmt;

use crate::backend::BackendError;

pub type EngineResult<T = ()> = Result<T, EngineError>;

/// Errors surfaced by the engine's public operations.
///
/// Out-of-range values are deliberately absent: they are clamped, never
/// reported.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Lookup or bind against an id the registry does not know.
    UnknownParameter(String),
    /// Registration of an id that is already present.
    DuplicateParameter(String),
    /// The voice engine could not service a call: no current generation,
    /// generation disposed, or the backend refused the operation.
    EngineUnavailable(String),
    /// Creating a voice engine failed; latched until an explicit retry.
    CreationFailed(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownParameter(id) => write!(f, "unknown parameter '{}'", id),
            EngineError::DuplicateParameter(id) => write!(f, "parameter '{}' already registered", id),
            EngineError::EngineUnavailable(msg) => write!(f, "voice engine unavailable: {}", msg),
            EngineError::CreationFailed(msg) => write!(f, "voice engine creation failed: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<BackendError> for EngineError {
    fn from(e: BackendError) -> Self {
        EngineError::EngineUnavailable(e.0)
    }
}
