//! Procedural terrain over an irregular planar mesh.
//!
//! The pipeline, leaves first:
//!
//! - [`PointField`]: random sample points plus the four corners, evened out by
//!   centroidal relaxation and rescaled back into the bounding rectangle.
//! - [`MeshGraph`]: Delaunay neighbor adjacency, rebuilt whenever points move.
//! - [`Heightfield`]: per-point elevation, precipitation, flow, flow velocity and
//!   sediment, with the deformation operators.
//! - [`FlowSimulator`]: downhill flow accumulation and erosion rounds.
//! - [`Snapshot`] / [`SnapshotStore`]: whole-terrain records on disk.
//! - [`TerrainView`] / [`ContourPalette`]: read-only access for renderers.
//!
//! ```rust,ignore
//! use terrain::prelude::*;
//!
//! let mut points = PointField::new(800.0, 500.0)?;
//! points.generate(2000, &mut rng);
//! points.relax_and_rescale(6)?;
//!
//! let mesh = MeshGraph::build(&points)?;
//! let mut heights = Heightfield::init(points.len(), -50.0);
//! heights.apply_radial(&points, Coord { x: 400.0, y: 250.0 }, 200.0, 500.0)?;
//! heights.set_uniform_precipitation(0.2)?;
//!
//! FlowSimulator::new(&points, &mesh)?.run(&mut heights, 5, 50.0)?;
//! heights.smooth(&points, &mesh, 0.5)?;
//! ```

pub mod errors;
pub mod flow;
pub mod geometry;
pub mod heightfield;
pub mod mesh;
pub mod points;
pub mod render;
pub mod snapshot;

pub use errors::{Result, TerrainError};
pub use flow::{FlowSimulator, RoundReport};
pub use heightfield::{ElevationBounds, Heightfield};
pub use mesh::MeshGraph;
pub use points::{FieldStamp, PointField};
pub use render::{ContourPalette, Rgba, TerrainView};
pub use snapshot::{RestoredTerrain, Snapshot, SnapshotStore};

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::{
        ContourPalette, ElevationBounds, FlowSimulator, Heightfield, MeshGraph, PointField,
        RoundReport, Snapshot, SnapshotStore, TerrainError, TerrainView,
    };
    pub use geo::Coord;
}
