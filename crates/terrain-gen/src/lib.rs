//! Terrain generation pipeline.
//!
//! Drives the `terrain` crate through a full run: scatter and relax points,
//! build the mesh, deform the heightfield, route precipitation, erode, smooth,
//! and capture a snapshot.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use terrain_gen::prelude::*;
//!
//! let terrain = TerrainBuilder::new()
//!     .with_name("archipelago")
//!     .with_points(1500)
//!     .with_erosion(5, 50.0)
//!     .with_seed(12345)
//!     .build_seeded()?;
//!
//! terrain.save(&SnapshotStore::new("maps"))?;
//! ```

pub mod builders;
pub mod config;
pub mod naming;
pub mod pipeline;
pub mod relief;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::builders::TerrainBuilder;
    pub use crate::config::{DeformationSpec, ErosionConfig, GenerationConfig, PrecipitationSpec};
    pub use crate::naming::random_map_name;
    pub use crate::pipeline::{GeneratedTerrain, Pipeline, PipelineError, PipelineMetrics, Stage};
    pub use crate::relief::ReliefGenerator;
    pub use terrain::{ElevationBounds, SnapshotStore};
}
