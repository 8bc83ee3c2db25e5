//! Artifact sink adapters

mod directory;

pub use directory::DirectorySink;
