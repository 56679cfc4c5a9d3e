//! Delaunay neighbor graph over a point field.
//!
//! The triangulation is built incrementally (Bowyer-Watson) inside a large
//! enclosing triangle that is discarded afterwards. The graph is immutable once
//! built; when the points move, build a new one.

use std::collections::{BTreeMap, BTreeSet};

use geo::Coord;
use tracing::debug;

use crate::errors::{Result, TerrainError};
use crate::geometry::{Circumcircle, cross};
use crate::points::{FieldStamp, PointField};

/// How far the enclosing triangle reaches beyond the point cloud, in cloud extents.
const SUPER_TRIANGLE_SCALE: f64 = 100.0;

/// Relative area below which three points are treated as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-12;

/// Undirected adjacency between point indices, derived from a triangulation.
#[derive(Debug, Clone)]
pub struct MeshGraph {
    neighbors: Vec<Vec<usize>>,
    triangles: Vec<[usize; 3]>,
    hull: Vec<bool>,
    stamp: FieldStamp,
}

impl MeshGraph {
    /// Triangulates `points` and derives the sorted neighbor list of every index.
    pub fn build(points: &PointField) -> Result<Self> {
        let coords = points.points();
        let triangles = triangulate(coords)?;

        let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); coords.len()];
        let mut edge_use: BTreeMap<(usize, usize), u32> = BTreeMap::new();
        for tri in &triangles {
            for (a, b) in triangle_edges(*tri) {
                adjacency[a].insert(b);
                adjacency[b].insert(a);
                *edge_use.entry((a, b)).or_insert(0) += 1;
            }
        }

        let mut hull = vec![false; coords.len()];
        for (&(a, b), &uses) in &edge_use {
            if uses == 1 {
                hull[a] = true;
                hull[b] = true;
            }
        }

        if let Some(i) = adjacency.iter().position(BTreeSet::is_empty) {
            return Err(TerrainError::DegenerateGeometry(format!(
                "point {i} was left out of the triangulation"
            )));
        }

        debug!(
            points = coords.len(),
            triangles = triangles.len(),
            edges = edge_use.len(),
            "Built mesh graph"
        );

        Ok(Self {
            neighbors: adjacency
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
            triangles,
            hull,
            stamp: points.stamp(),
        })
    }

    /// Builds a graph from explicit neighbor lists, one per point of `points`.
    ///
    /// The lists must be symmetric, loop-free and non-empty. A graph built this
    /// way carries no triangles and reports no hull points.
    pub fn from_adjacency(points: &PointField, adjacency: Vec<Vec<usize>>) -> Result<Self> {
        let len = points.len();
        if adjacency.len() != len {
            return Err(TerrainError::InvalidMeshState(format!(
                "adjacency has {} entries for {} points",
                adjacency.len(),
                len
            )));
        }

        let mut neighbors = Vec::with_capacity(len);
        for (i, mut list) in adjacency.into_iter().enumerate() {
            list.sort_unstable();
            list.dedup();
            if list.is_empty() {
                return Err(TerrainError::InvalidMeshState(format!(
                    "point {i} has no neighbors"
                )));
            }
            for &j in &list {
                TerrainError::check_index(j, len)?;
                if j == i {
                    return Err(TerrainError::InvalidMeshState(format!(
                        "point {i} lists itself as a neighbor"
                    )));
                }
            }
            neighbors.push(list);
        }

        for (i, list) in neighbors.iter().enumerate() {
            if let Some(&j) = list.iter().find(|&&j| neighbors[j].binary_search(&i).is_err()) {
                return Err(TerrainError::InvalidMeshState(format!(
                    "adjacency is not symmetric: {i} -> {j} has no reverse edge"
                )));
            }
        }

        Ok(Self {
            neighbors,
            triangles: Vec::new(),
            hull: vec![false; len],
            stamp: points.stamp(),
        })
    }

    /// Sorted neighbor indices of `index`.
    pub fn neighbors(&self, index: usize) -> Result<&[usize]> {
        TerrainError::check_index(index, self.neighbors.len())?;
        Ok(&self.neighbors[index])
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// True when `index` lies on the boundary of the triangulated region.
    pub fn is_hull(&self, index: usize) -> bool {
        self.hull.get(index).copied().unwrap_or(false)
    }

    /// Generation of the point field this graph was built from.
    pub fn generation(&self) -> u64 {
        self.stamp.generation
    }

    /// Fails unless this graph was built from the current state of `points`.
    pub fn ensure_current(&self, points: &PointField) -> Result<()> {
        if self.stamp != points.stamp() || self.len() != points.len() {
            return Err(TerrainError::InvalidMeshState(format!(
                "mesh built from generation {} of field {} queried against generation {} of field {}",
                self.stamp.generation,
                self.stamp.field_id,
                points.generation(),
                points.stamp().field_id,
            )));
        }
        Ok(())
    }
}

/// Normalised (low, high) edges of a triangle.
fn triangle_edges([a, b, c]: [usize; 3]) -> [(usize, usize); 3] {
    let edge = |u: usize, v: usize| if u < v { (u, v) } else { (v, u) };
    [edge(a, b), edge(b, c), edge(c, a)]
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    vertices: [usize; 3],
    circle: Circumcircle,
}

impl Triangle {
    fn new(vertices: [usize; 3], coords: &[Coord<f64>]) -> Self {
        let [a, b, c] = vertices.map(|v| coords[v]);
        Self {
            vertices,
            circle: Circumcircle::of(a, b, c),
        }
    }
}

/// Delaunay triangulation of `coords` as index triples.
fn triangulate(coords: &[Coord<f64>]) -> Result<Vec<[usize; 3]>> {
    let n = coords.len();
    if n < 3 {
        return Err(TerrainError::DegenerateGeometry(format!(
            "triangulation needs at least 3 points, got {n}"
        )));
    }
    check_coincident(coords)?;
    check_collinear(coords)?;

    let (mut min, mut max) = (coords[0], coords[0]);
    for p in coords {
        min = Coord {
            x: min.x.min(p.x),
            y: min.y.min(p.y),
        };
        max = Coord {
            x: max.x.max(p.x),
            y: max.y.max(p.y),
        };
    }
    let span = (max.x - min.x).max(max.y - min.y);
    let mid = Coord {
        x: (min.x + max.x) / 2.0,
        y: (min.y + max.y) / 2.0,
    };

    let mut vertices = coords.to_vec();
    vertices.push(Coord {
        x: mid.x - SUPER_TRIANGLE_SCALE * span,
        y: mid.y - span,
    });
    vertices.push(Coord {
        x: mid.x,
        y: mid.y + SUPER_TRIANGLE_SCALE * span,
    });
    vertices.push(Coord {
        x: mid.x + SUPER_TRIANGLE_SCALE * span,
        y: mid.y - span,
    });

    let mut triangles = vec![Triangle::new([n, n + 1, n + 2], &vertices)];

    for (i, &p) in coords.iter().enumerate() {
        let mut cavity: BTreeMap<(usize, usize), u32> = BTreeMap::new();
        triangles.retain(|t| {
            if t.circle.contains(p) {
                for e in triangle_edges(t.vertices) {
                    *cavity.entry(e).or_insert(0) += 1;
                }
                false
            } else {
                true
            }
        });

        for ((a, b), uses) in cavity {
            if uses == 1 {
                triangles.push(Triangle::new([a, b, i], &vertices));
            }
        }
    }

    Ok(triangles
        .into_iter()
        .map(|t| t.vertices)
        .filter(|v| v.iter().all(|&idx| idx < n))
        .collect())
}

fn check_coincident(coords: &[Coord<f64>]) -> Result<()> {
    let mut order: Vec<usize> = (0..coords.len()).collect();
    order.sort_by(|&a, &b| {
        coords[a]
            .x
            .total_cmp(&coords[b].x)
            .then(coords[a].y.total_cmp(&coords[b].y))
    });

    for pair in order.windows(2) {
        if coords[pair[0]] == coords[pair[1]] {
            let (a, b) = (pair[0].min(pair[1]), pair[0].max(pair[1]));
            return Err(TerrainError::DegenerateGeometry(format!(
                "points {a} and {b} coincide"
            )));
        }
    }
    Ok(())
}

fn check_collinear(coords: &[Coord<f64>]) -> Result<()> {
    let origin = coords[0];
    let dist_sq = |p: &Coord<f64>| (p.x - origin.x).powi(2) + (p.y - origin.y).powi(2);

    let far = coords
        .iter()
        .copied()
        .max_by(|a, b| dist_sq(a).total_cmp(&dist_sq(b)))
        .unwrap_or(origin);
    let scale = dist_sq(&far);

    let spread = coords
        .iter()
        .map(|&p| cross(origin, far, p).abs())
        .fold(0.0, f64::max);

    if scale == 0.0 || spread <= COLLINEAR_TOLERANCE * scale {
        return Err(TerrainError::DegenerateGeometry(
            "all points are collinear".to_string(),
        ));
    }
    Ok(())
}
