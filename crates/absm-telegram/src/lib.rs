//! Telegram adapter (teloxide).
//!
//! Maps commands and inline-menu callbacks onto the `absm-core` aggregation
//! service and renders its views as Telegram HTML.

pub mod handlers;
pub mod menu;
pub mod router;
