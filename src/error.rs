//! Error taxonomy for the runtime core

use crate::entity::EntityId;
use thiserror::Error;

/// Errors raised by the entity, component, and engine APIs.
///
/// None of these are transient: the core does no I/O, so every variant
/// signals programmer misuse and propagates to the caller unretried.
#[derive(Debug, Error)]
pub enum EcsError {
    /// The referenced id is inactive, stale, or already pending deletion.
    #[error("invalid entity {0:?}")]
    InvalidEntity(EntityId),

    /// The same system type was registered twice on one engine.
    #[error("system `{0}` already registered")]
    DuplicateSystem(String),

    /// An index-based lookup referenced a component type index the
    /// registry has never assigned.
    #[error("unknown component type index {0}")]
    UnknownComponentType(usize),

    /// `register_pooled` was called after the type's storage had already
    /// been opened with a different classification.
    #[error("component `{0}` already open with a different storage classification")]
    InvalidClassification(&'static str),
}
