//! Retrieval index built from configured web pages.

pub mod loader;
pub mod service;
pub mod splitter;
pub mod store;

pub use service::{VectorInfo, VectorService};
