//! Read-only terrain access for renderers, plus the contour palette they share.

use geo::Coord;

use crate::errors::{Result, TerrainError};
use crate::heightfield::Heightfield;
use crate::mesh::MeshGraph;
use crate::points::PointField;

/// RGBA colour.
pub type Rgba = [u8; 4];

/// Contour levels in elevation units, lowest first.
pub const CONTOUR_LEVELS: [f64; 17] = [
    -3000.0, -2000.0, -1000.0, -500.0, -100.0, 0.0, 100.0, 500.0, 1000.0, 2000.0, 3000.0, 4000.0,
    5000.0, 6000.0, 7000.0, 8000.0, 8500.0,
];

/// Fill colour of each band between consecutive contour levels.
pub const CONTOUR_COLORS: [Rgba; 16] = [
    [0x71, 0xab, 0xd8, 0xff],
    [0x84, 0xb9, 0xe3, 0xff],
    [0xa1, 0xd2, 0xf7, 0xff],
    [0xc6, 0xec, 0xff, 0xff],
    [0xd8, 0xf2, 0xfe, 0xff],
    [0xac, 0xd0, 0xa5, 0xff],
    [0x94, 0xbf, 0x8b, 0xff],
    [0xbd, 0xcc, 0x96, 0xff],
    [0xd1, 0xd7, 0xab, 0xff],
    [0xef, 0xeb, 0xc0, 0xff],
    [0xde, 0xd6, 0xa3, 0xff],
    [0xca, 0xb9, 0x82, 0xff],
    [0xb9, 0x98, 0x5a, 0xff],
    [0xac, 0x9a, 0x7c, 0xff],
    [0xca, 0xc3, 0xb8, 0xff],
    [0xf5, 0xf4, 0xf2, 0xff],
];

/// Hypsometric tint table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContourPalette;

impl ContourPalette {
    pub fn levels(&self) -> &'static [f64] {
        &CONTOUR_LEVELS
    }

    /// Band containing `elevation`, `None` outside the outermost levels.
    ///
    /// Bands are half-open except the top one, which includes its upper level.
    pub fn band_index(&self, elevation: f64) -> Option<usize> {
        let last = CONTOUR_LEVELS.len() - 1;
        if !(CONTOUR_LEVELS[0]..=CONTOUR_LEVELS[last]).contains(&elevation) {
            return None;
        }
        let above = CONTOUR_LEVELS.partition_point(|&level| level <= elevation);
        Some((above - 1).min(last - 1))
    }

    /// Colour for `elevation`; values beyond the table use the nearest end band.
    pub fn color_for(&self, elevation: f64) -> Rgba {
        let band = match self.band_index(elevation) {
            Some(band) => band,
            None if elevation > CONTOUR_LEVELS[CONTOUR_LEVELS.len() - 1] => CONTOUR_COLORS.len() - 1,
            None => 0,
        };
        CONTOUR_COLORS[band]
    }
}

/// Borrowed view of points, adjacency and elevations.
#[derive(Debug, Clone, Copy)]
pub struct TerrainView<'a> {
    points: &'a PointField,
    mesh: &'a MeshGraph,
    heights: &'a Heightfield,
    palette: ContourPalette,
}

impl<'a> TerrainView<'a> {
    /// Fails if the mesh is stale or the arrays disagree in size.
    pub fn new(
        points: &'a PointField,
        mesh: &'a MeshGraph,
        heights: &'a Heightfield,
    ) -> Result<Self> {
        mesh.ensure_current(points)?;
        TerrainError::check_sizes("heightfield", points.len(), heights.len())?;
        Ok(Self {
            points,
            mesh,
            heights,
            palette: ContourPalette,
        })
    }

    pub fn points(&self) -> &'a [Coord<f64>] {
        self.points.points()
    }

    pub fn elevations(&self) -> &'a [f64] {
        self.heights.elevations()
    }

    pub fn neighbors(&self, index: usize) -> Result<&'a [usize]> {
        self.mesh.neighbors(index)
    }

    pub fn sea_level(&self) -> f64 {
        self.heights.sea_level()
    }

    /// Each undirected mesh edge once, as `(low, high)` indices.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + 'a {
        let mesh = self.mesh;
        (0..mesh.len()).flat_map(move |i| {
            mesh.neighbors(i)
                .unwrap_or_default()
                .iter()
                .filter(move |&&j| j > i)
                .map(move |&j| (i, j))
        })
    }

    /// Triangle corners with their elevations.
    pub fn triangles(&self) -> impl Iterator<Item = ([Coord<f64>; 3], [f64; 3])> + 'a {
        let coords = self.points.points();
        let elevations = self.heights.elevations();
        self.mesh
            .triangles()
            .iter()
            .map(move |&tri| (tri.map(|v| coords[v]), tri.map(|v| elevations[v])))
    }

    pub fn color_at(&self, index: usize) -> Result<Rgba> {
        Ok(self.palette.color_for(self.heights.elevation(index)?))
    }
}
