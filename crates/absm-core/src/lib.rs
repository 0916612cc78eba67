//! Core domain + application logic for the Audiobookshelf manager bot.
//!
//! This crate is intentionally framework-agnostic. The Audiobookshelf HTTP
//! client and Telegram live in adapter crates; the upstream API is reached
//! through the `MediaServerApi` port.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod model;
pub mod security;
pub mod service;

pub use errors::{Error, Result};
