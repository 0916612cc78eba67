//! Audiobookshelf entities and the upstream API port.

pub mod client;
pub mod types;
