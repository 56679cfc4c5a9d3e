//! Fluent builder API for generation runs.
//!
//! The [`TerrainBuilder`] assembles a [`GenerationConfig`](crate::config::GenerationConfig)
//! step by step and hands it to the [`Pipeline`](crate::pipeline::Pipeline).

mod generation;

pub use generation::TerrainBuilder;
