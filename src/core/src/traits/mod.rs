//! Shared traits for directory backends

pub mod directory;

// Re-export commonly used traits
pub use directory::DirectoryBackend;
