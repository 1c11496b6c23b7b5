//! Application layer orchestrating domain logic and infrastructure.

pub mod controller;
pub mod encoder;
pub mod matcher;
pub mod render;
pub mod view;
