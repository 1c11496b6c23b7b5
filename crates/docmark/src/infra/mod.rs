//! Infrastructure adapters for persistence, config, and markdown/code rendering.

pub mod config;
pub mod highlight;
pub mod markdown;
pub mod store;
