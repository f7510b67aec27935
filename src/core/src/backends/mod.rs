//! Directory backends shipped with the core: fixtures and caching

pub mod memory;
pub mod cached;

pub use memory::{DirectorySnapshot, InMemoryDirectory, MembershipEdge};
pub use cached::{CacheConfig, CacheStats, CachedDirectory};
