//! Sample point generation and Lloyd-style relaxation.
//!
//! A [`PointField`] owns an ordered sequence of planar points inside the
//! rectangle `(0, 0)-(width, height)`. A point's identity is its position in the
//! sequence: relaxation and rescaling move coordinates but never reorder, add or
//! remove points, so indices held by a [`Heightfield`](crate::Heightfield) or a
//! [`MeshGraph`] stay valid.
//!
//! Every mutation bumps a generation counter. A [`MeshGraph`] records the
//! generation it was built from and refuses to vouch for a field that has
//! moved on since.

use std::sync::atomic::{AtomicU64, Ordering};

use geo::{Coord, Rect};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use tracing::{debug, warn};

use crate::errors::{Result, TerrainError};
use crate::geometry::{Circumcircle, polygon_centroid};
use crate::mesh::MeshGraph;

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one state of one point field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldStamp {
    pub field_id: u64,
    pub generation: u64,
}

/// Ordered set of 2-D sample points within a bounding rectangle.
#[derive(Debug, Clone)]
pub struct PointField {
    id: u64,
    width: f64,
    height: f64,
    points: Vec<Coord<f64>>,
    generation: u64,
}

impl PointField {
    /// Creates an empty field over `(0, 0)-(width, height)`.
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(TerrainError::InvalidParameter(format!(
                "field dimensions must be positive, got {width} x {height}"
            )));
        }

        Ok(Self {
            id: NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            points: Vec::new(),
            generation: 0,
        })
    }

    /// Creates a field from an existing point sequence, e.g. a restored snapshot.
    pub fn from_points(width: f64, height: f64, points: Vec<Coord<f64>>) -> Result<Self> {
        if let Some(i) = points.iter().position(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(TerrainError::InvalidParameter(format!(
                "point {i} has a non-finite coordinate"
            )));
        }

        let mut field = Self::new(width, height)?;
        field.points = points;
        Ok(field)
    }

    /// Replaces the points with `count` uniformly random points plus the four
    /// rectangle corners, giving `count + 4` points.
    pub fn generate(&mut self, count: usize, rng: &mut impl Rng) {
        let xs = Uniform::new(0.0, self.width);
        let ys = Uniform::new(0.0, self.height);

        let mut points = Vec::with_capacity(count + 4);
        for _ in 0..count {
            points.push(Coord {
                x: xs.sample(rng),
                y: ys.sample(rng),
            });
        }

        points.extend(self.corners());

        debug!(count = points.len(), "Generated point field");
        self.points = points;
        self.bump();
    }

    /// One pass of centroidal relaxation.
    ///
    /// Each point with a bounded Voronoi cell moves to the area centroid of that
    /// cell. Points on the triangulation hull have unbounded cells and stay put,
    /// which keeps the corner points fixed.
    pub fn relax(&mut self) -> Result<()> {
        let mesh = MeshGraph::build(self)?;
        let centroids = self.cell_centroids(&mesh);

        let mut moved = 0usize;
        let mut displacement = 0.0;
        let relaxed: Vec<Coord<f64>> = self
            .points
            .iter()
            .zip(centroids)
            .map(|(&p, centroid)| match centroid {
                Some(c) => {
                    moved += 1;
                    displacement += ((c.x - p.x).powi(2) + (c.y - p.y).powi(2)).sqrt();
                    c
                }
                None => p,
            })
            .collect();

        debug!(
            moved,
            mean_displacement = displacement / moved.max(1) as f64,
            "Relaxed point field"
        );

        self.points = relaxed;
        self.bump();
        Ok(())
    }

    /// Affinely maps the points so their bounding box is exactly the field rectangle.
    pub fn rescale(&mut self) -> Result<()> {
        let bbox = self.bounding_box().ok_or_else(|| {
            TerrainError::DegenerateGeometry("cannot rescale an empty point field".to_string())
        })?;

        let (min, max) = (bbox.min(), bbox.max());
        let (dx, dy) = (max.x - min.x, max.y - min.y);
        if dx <= 0.0 || dy <= 0.0 {
            return Err(TerrainError::DegenerateGeometry(format!(
                "point cloud has zero extent ({dx} x {dy})"
            )));
        }

        for p in &mut self.points {
            p.x = (p.x - min.x) / dx * self.width;
            p.y = (p.y - min.y) / dy * self.height;
        }

        self.bump();
        Ok(())
    }

    /// Runs `relax()` followed by `rescale()`, `n` times.
    pub fn relax_and_rescale(&mut self, n: usize) -> Result<()> {
        for i in 0..n {
            debug!(iteration = i, "Relaxation iteration");
            self.relax()?;
            self.rescale()?;
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Result<Coord<f64>> {
        TerrainError::check_index(index, self.points.len())?;
        Ok(self.points[index])
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stamp(&self) -> FieldStamp {
        FieldStamp {
            field_id: self.id,
            generation: self.generation,
        }
    }

    /// The nominal rectangle `(0, 0)-(width, height)`.
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: 0.0, y: 0.0 },
            Coord {
                x: self.width,
                y: self.height,
            },
        )
    }

    /// Bounding box of the current points, `None` when empty.
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        let first = *self.points.first()?;
        let (min, max) = self.points.iter().fold((first, first), |(min, max), p| {
            (
                Coord {
                    x: min.x.min(p.x),
                    y: min.y.min(p.y),
                },
                Coord {
                    x: max.x.max(p.x),
                    y: max.y.max(p.y),
                },
            )
        });
        Some(Rect::new(min, max))
    }

    fn corners(&self) -> [Coord<f64>; 4] {
        [
            Coord { x: 0.0, y: 0.0 },
            Coord {
                x: self.width,
                y: 0.0,
            },
            Coord {
                x: 0.0,
                y: self.height,
            },
            Coord {
                x: self.width,
                y: self.height,
            },
        ]
    }

    fn bump(&mut self) {
        self.generation += 1;
    }

    /// Centroid of each point's Voronoi cell, or `None` where the cell is unbounded.
    ///
    /// A bounded cell is the polygon of circumcentres of the triangles around the
    /// point, taken in angular order.
    fn cell_centroids(&self, mesh: &MeshGraph) -> Vec<Option<Coord<f64>>> {
        let mut cells: Vec<Vec<Coord<f64>>> = vec![Vec::new(); self.points.len()];

        for &tri in mesh.triangles() {
            let [a, b, c] = tri.map(|v| self.points[v]);
            let circle = Circumcircle::of(a, b, c);
            if !circle.radius_sq.is_finite() {
                continue;
            }
            for v in tri {
                cells[v].push(circle.center);
            }
        }

        cells
            .into_iter()
            .enumerate()
            .map(|(i, mut ring)| {
                if mesh.is_hull(i) || ring.len() < 3 {
                    return None;
                }
                let p = self.points[i];
                ring.sort_by(|a, b| {
                    let ta = (a.y - p.y).atan2(a.x - p.x);
                    let tb = (b.y - p.y).atan2(b.x - p.x);
                    ta.total_cmp(&tb)
                });
                let centroid = polygon_centroid(&ring);
                if centroid.is_none() {
                    warn!(point = i, "Voronoi cell has no centroid; point left in place");
                }
                centroid
            })
            .collect()
    }
}
