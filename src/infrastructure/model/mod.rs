//! Model source adapters

mod directory;
mod http;

pub use directory::DirectoryModelSource;
pub use http::HttpModelSource;
