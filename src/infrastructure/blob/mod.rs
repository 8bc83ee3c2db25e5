//! Blob storage adapters

mod memory;

pub use memory::MemoryBlobStore;
