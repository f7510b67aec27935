//! # Dirgate Core
//!
//! Entity model, error handling and the backend contract shared by every
//! identity source the gateway exposes (REST directories, fixture files, the
//! relational cache).

pub mod types;
pub mod traits;
pub mod backends;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{Domain, Entity, EntityId, EntityKind, Group, OrganizationalUnit, User};
pub use traits::DirectoryBackend;
pub use backends::{CachedDirectory, DirectorySnapshot, InMemoryDirectory};
