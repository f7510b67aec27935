//! Shared directory types

pub mod id;
pub mod entity;

// Re-export commonly used types
pub use id::{EntityId, EntityKind};
pub use entity::{Domain, Entity, Group, OrganizationalUnit, User};
