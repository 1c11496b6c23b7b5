//! Core domain types: the rendered tree, structural paths, and highlights.

pub mod errors;
pub mod model;
pub mod tree;
