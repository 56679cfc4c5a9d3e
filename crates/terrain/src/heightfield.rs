//! Per-point scalar state and the deformation operators that mutate it.

use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, TerrainError};
use crate::geometry::dist_2d;
use crate::mesh::MeshGraph;
use crate::points::PointField;

/// Inclusive range every elevation is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ElevationBounds {
    fn default() -> Self {
        Self {
            floor: -3000.0,
            ceiling: 8800.0,
        }
    }
}

impl ElevationBounds {
    pub fn new(floor: f64, ceiling: f64) -> Result<Self> {
        let bounds = Self { floor, ceiling };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.floor.is_finite() && self.ceiling.is_finite() && self.floor <= self.ceiling) {
            return Err(TerrainError::InvalidParameter(format!(
                "elevation floor {} must not exceed ceiling {}",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }

    pub fn clamp(&self, elevation: f64) -> f64 {
        elevation.clamp(self.floor, self.ceiling)
    }

    pub fn contains(&self, elevation: f64) -> bool {
        (self.floor..=self.ceiling).contains(&elevation)
    }
}

/// Parallel per-point arrays: elevation, precipitation, flow, flow velocity and sediment.
#[derive(Debug, Clone)]
pub struct Heightfield {
    pub(crate) elevation: Vec<f64>,
    pub(crate) precipitation: Vec<f64>,
    pub(crate) flow: Vec<f64>,
    pub(crate) flow_velocity: Vec<f64>,
    sediment: Vec<f64>,
    bounds: ElevationBounds,
    sea_level: f64,
}

impl Heightfield {
    /// Allocates `n` points at `initial_elevation`; every other array starts at zero.
    pub fn init(n: usize, initial_elevation: f64) -> Self {
        let bounds = ElevationBounds::default();
        Self {
            elevation: vec![bounds.clamp(initial_elevation); n],
            precipitation: vec![0.0; n],
            flow: vec![0.0; n],
            flow_velocity: vec![0.0; n],
            sediment: vec![0.0; n],
            bounds,
            sea_level: 0.0,
        }
    }

    /// Builds a field from stored elevations, rejecting values outside `bounds`.
    pub fn from_elevations(elevations: Vec<f64>, bounds: ElevationBounds) -> Result<Self> {
        bounds.validate()?;
        if let Some(i) = elevations.iter().position(|z| !bounds.contains(*z)) {
            return Err(TerrainError::InvalidParameter(format!(
                "elevation {} at point {i} lies outside [{}, {}]",
                elevations[i], bounds.floor, bounds.ceiling
            )));
        }

        let n = elevations.len();
        let mut field = Self::init(n, 0.0).with_bounds(bounds);
        field.elevation = elevations;
        Ok(field)
    }

    /// Replaces the clamp range and re-clamps the current elevations.
    pub fn with_bounds(mut self, bounds: ElevationBounds) -> Self {
        self.bounds = bounds;
        for z in &mut self.elevation {
            *z = bounds.clamp(*z);
        }
        self
    }

    pub fn with_sea_level(mut self, sea_level: f64) -> Self {
        self.sea_level = sea_level;
        self
    }

    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }

    pub fn bounds(&self) -> ElevationBounds {
        self.bounds
    }

    pub fn floor(&self) -> f64 {
        self.bounds.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.bounds.ceiling
    }

    pub fn sea_level(&self) -> f64 {
        self.sea_level
    }

    pub fn elevations(&self) -> &[f64] {
        &self.elevation
    }

    pub fn precipitation(&self) -> &[f64] {
        &self.precipitation
    }

    pub fn flows(&self) -> &[f64] {
        &self.flow
    }

    pub fn flow_velocities(&self) -> &[f64] {
        &self.flow_velocity
    }

    pub fn sediment(&self) -> &[f64] {
        &self.sediment
    }

    pub fn elevation(&self, index: usize) -> Result<f64> {
        TerrainError::check_index(index, self.len())?;
        Ok(self.elevation[index])
    }

    pub fn flow(&self, index: usize) -> Result<f64> {
        TerrainError::check_index(index, self.len())?;
        Ok(self.flow[index])
    }

    pub fn set_uniform_precipitation(&mut self, amount: f64) -> Result<()> {
        check_precipitation(0, amount)?;
        self.precipitation.fill(amount);
        Ok(())
    }

    pub fn set_precipitation(&mut self, precipitation: Vec<f64>) -> Result<()> {
        TerrainError::check_sizes("precipitation", self.len(), precipitation.len())?;
        for (i, &p) in precipitation.iter().enumerate() {
            check_precipitation(i, p)?;
        }
        self.precipitation = precipitation;
        Ok(())
    }

    /// A point is submerged when its elevation is at or below sea level.
    pub fn is_submerged(&self, index: usize) -> Result<bool> {
        Ok(self.elevation(index)? <= self.sea_level)
    }

    pub fn submerged_mask(&self) -> Vec<bool> {
        self.elevation.iter().map(|&z| z <= self.sea_level).collect()
    }

    /// Fraction of points above sea level.
    pub fn land_fraction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let land = self.elevation.iter().filter(|&&z| z > self.sea_level).count();
        land as f64 / self.len() as f64
    }

    /// Lowest and highest elevation, `None` when empty.
    pub fn elevation_range(&self) -> Option<(f64, f64)> {
        let first = *self.elevation.first()?;
        Some(
            self.elevation
                .iter()
                .fold((first, first), |(lo, hi), &z| (lo.min(z), hi.max(z))),
        )
    }

    /// "Flat locus": adds `delta` to every point within `radius` of `center`.
    ///
    /// Returns the number of points affected.
    pub fn apply_radial(
        &mut self,
        points: &PointField,
        center: Coord<f64>,
        radius: f64,
        delta: f64,
    ) -> Result<usize> {
        TerrainError::check_sizes("point field", self.len(), points.len())?;
        if !(radius >= 0.0 && delta.is_finite()) {
            return Err(TerrainError::InvalidParameter(format!(
                "flat locus needs radius >= 0 and finite delta, got r={radius} dz={delta}"
            )));
        }

        let mut affected = 0;
        for (z, &p) in self.elevation.iter_mut().zip(points.points()) {
            if dist_2d(center, p) <= radius {
                *z = self.bounds.clamp(*z + delta);
                affected += 1;
            }
        }

        debug!(affected, radius, delta, "Applied flat locus");
        Ok(affected)
    }

    /// "Bounded quad": adds `clamp(a·n² + b·n + c, z_min, z_max)` where `n` is the
    /// distance from `center`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_quadratic(
        &mut self,
        points: &PointField,
        center: Coord<f64>,
        z_min: f64,
        z_max: f64,
        a: f64,
        b: f64,
        c: f64,
    ) -> Result<()> {
        TerrainError::check_sizes("point field", self.len(), points.len())?;
        if !(z_min <= z_max) || ![a, b, c].iter().all(|k| k.is_finite()) {
            return Err(TerrainError::InvalidParameter(format!(
                "bounded quad needs z_min <= z_max and finite coefficients, got [{z_min}, {z_max}] a={a} b={b} c={c}"
            )));
        }

        for (z, &p) in self.elevation.iter_mut().zip(points.points()) {
            let n = dist_2d(center, p);
            let dz = (a * n * n + b * n + c).clamp(z_min, z_max);
            *z = self.bounds.clamp(*z + dz);
        }

        debug!(x = center.x, y = center.y, a, b, c, "Applied bounded quad");
        Ok(())
    }

    /// Adds a per-point elevation delta, then clamps.
    pub fn add_elevation_field(&mut self, deltas: &[f64]) -> Result<()> {
        TerrainError::check_sizes("elevation deltas", self.len(), deltas.len())?;
        for (z, dz) in self.elevation.iter_mut().zip(deltas) {
            *z = self.bounds.clamp(*z + dz);
        }
        Ok(())
    }

    /// Moves each point toward the mean of itself and its neighbors by `factor`.
    ///
    /// All deltas are computed from the elevations as they were before the pass.
    /// Fails with `InvalidMeshState` if `mesh` was not built from the current `points`.
    pub fn smooth(&mut self, points: &PointField, mesh: &MeshGraph, factor: f64) -> Result<()> {
        mesh.ensure_current(points)?;
        TerrainError::check_sizes("mesh graph", self.len(), mesh.len())?;
        if !factor.is_finite() {
            return Err(TerrainError::InvalidParameter(format!(
                "smoothing factor must be finite, got {factor}"
            )));
        }

        let mut deltas = Vec::with_capacity(self.len());
        for (i, &z) in self.elevation.iter().enumerate() {
            let neighbors = mesh.neighbors(i)?;
            if neighbors.is_empty() {
                return Err(TerrainError::InvalidMeshState(format!(
                    "point {i} has no neighbors to smooth against"
                )));
            }
            let total: f64 = neighbors.iter().map(|&j| self.elevation[j]).sum::<f64>() + z;
            let mean = total / (neighbors.len() + 1) as f64;
            deltas.push((mean - z) * factor);
        }

        self.add_elevation_field(&deltas)?;
        debug!(factor, "Smoothed heightfield");
        Ok(())
    }

    /// Applies `deltas` where `mask` is true, clamping the result.
    pub(crate) fn apply_masked(&mut self, deltas: &[f64], mask: &[bool]) {
        for ((z, dz), &active) in self.elevation.iter_mut().zip(deltas).zip(mask) {
            if active {
                *z = self.bounds.clamp(*z + dz);
            }
        }
    }
}

fn check_precipitation(index: usize, amount: f64) -> Result<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(TerrainError::InvalidParameter(format!(
            "precipitation at point {index} must be non-negative, got {amount}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_field() -> PointField {
        PointField::from_points(
            100.0,
            100.0,
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 10.0, y: 0.0 },
                Coord { x: 20.0, y: 0.0 },
            ],
        )
        .unwrap()
    }

    fn chain_mesh(points: &PointField) -> MeshGraph {
        MeshGraph::from_adjacency(points, vec![vec![1], vec![0, 2], vec![1]]).unwrap()
    }

    #[test]
    fn test_init() {
        let field = Heightfield::init(5, -50.0);
        assert_eq!(field.len(), 5);
        assert!(field.elevations().iter().all(|&z| z == -50.0));
        assert!(field.precipitation().iter().all(|&p| p == 0.0));
        assert!(field.flows().iter().all(|&f| f == 0.0));
        assert!(field.sediment().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_init_clamps() {
        let field = Heightfield::init(2, 50.0).with_bounds(ElevationBounds::new(0.0, 10.0).unwrap());
        assert_eq!(field.elevations(), &[10.0, 10.0]);
    }

    #[test]
    fn test_bounds_validation() {
        assert!(ElevationBounds::new(10.0, 0.0).is_err());
        assert!(ElevationBounds::new(f64::NEG_INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_apply_radial() {
        let points = line_field();
        let mut field = Heightfield::init(3, 0.0);
        let hit = field
            .apply_radial(&points, Coord { x: 0.0, y: 0.0 }, 10.0, 25.0)
            .unwrap();

        assert_eq!(hit, 2);
        assert_eq!(field.elevations(), &[25.0, 25.0, 0.0]);
    }

    #[test]
    fn test_apply_radial_clamps_to_ceiling() {
        let points = line_field();
        let mut field =
            Heightfield::init(3, 0.0).with_bounds(ElevationBounds::new(-10.0, 100.0).unwrap());
        field
            .apply_radial(&points, Coord { x: 10.0, y: 0.0 }, 1000.0, 500.0)
            .unwrap();
        assert_eq!(field.elevations(), &[100.0, 100.0, 100.0]);
    }

    #[test]
    fn test_apply_quadratic() {
        let points = line_field();
        let mut field = Heightfield::init(3, 0.0);
        // dz = -n² + 200 bounded to [0, 150]
        field
            .apply_quadratic(&points, Coord { x: 0.0, y: 0.0 }, 0.0, 150.0, -1.0, 0.0, 200.0)
            .unwrap();
        assert_eq!(field.elevations(), &[150.0, 100.0, 0.0]);
    }

    #[test]
    fn test_apply_quadratic_rejects_inverted_range() {
        let points = line_field();
        let mut field = Heightfield::init(3, 0.0);
        assert!(matches!(
            field.apply_quadratic(&points, Coord { x: 0.0, y: 0.0 }, 5.0, 1.0, 0.0, 0.0, 0.0),
            Err(TerrainError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_size_mismatch_is_uninitialized() {
        let points = line_field();
        let mut field = Heightfield::init(2, 0.0);
        assert!(matches!(
            field.apply_radial(&points, Coord { x: 0.0, y: 0.0 }, 1.0, 1.0),
            Err(TerrainError::UninitializedState(_))
        ));
    }

    #[test]
    fn test_smooth_uses_old_elevations() {
        let points = line_field();
        let mesh = chain_mesh(&points);
        let mut field = Heightfield::from_elevations(vec![0.0, 90.0, 0.0], ElevationBounds::default())
            .unwrap();
        field.smooth(&points, &mesh, 1.0).unwrap();

        // Ends see mean(0, 90) = 45, middle sees mean(0, 90, 0) = 30.
        assert_eq!(field.elevations(), &[45.0, 30.0, 45.0]);
    }

    #[test]
    fn test_smooth_factor_zero_is_noop() {
        let points = line_field();
        let mesh = chain_mesh(&points);
        let mut field = Heightfield::from_elevations(vec![3.0, 7.0, 11.0], ElevationBounds::default())
            .unwrap();
        field.smooth(&points, &mesh, 0.0).unwrap();
        assert_eq!(field.elevations(), &[3.0, 7.0, 11.0]);
    }

    #[test]
    fn test_smooth_rejects_non_finite_factor() {
        let points = line_field();
        let mesh = chain_mesh(&points);
        let mut field = Heightfield::init(3, 5.0);
        for factor in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                field.smooth(&points, &mesh, factor),
                Err(TerrainError::InvalidParameter(_))
            ));
        }
        assert_eq!(field.elevations(), &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_smooth_rejects_stale_mesh() {
        let mesh = chain_mesh(&line_field());
        let mut field = Heightfield::init(3, 5.0);
        assert!(matches!(
            field.smooth(&line_field(), &mesh, 0.5),
            Err(TerrainError::InvalidMeshState(_))
        ));
    }

    #[test]
    fn test_precipitation_validation() {
        let mut field = Heightfield::init(2, 0.0);
        field.set_uniform_precipitation(0.2).unwrap();
        assert_eq!(field.precipitation(), &[0.2, 0.2]);

        assert!(field.set_uniform_precipitation(-1.0).is_err());
        assert!(field.set_precipitation(vec![1.0]).is_err());
        assert!(field.set_precipitation(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_sea_level_queries() {
        let field = Heightfield::from_elevations(vec![-5.0, 0.0, 5.0, 10.0], ElevationBounds::default())
            .unwrap()
            .with_sea_level(0.0);

        assert_eq!(field.submerged_mask(), vec![true, true, false, false]);
        assert!(field.is_submerged(1).unwrap());
        assert!(field.is_submerged(4).is_err());
        assert!((field.land_fraction() - 0.5).abs() < 1e-12);
        assert_eq!(field.elevation_range(), Some((-5.0, 10.0)));
    }

    #[test]
    fn test_from_elevations_rejects_out_of_bounds() {
        let bounds = ElevationBounds::new(0.0, 100.0).unwrap();
        assert!(Heightfield::from_elevations(vec![50.0, 150.0], bounds).is_err());
        assert!(Heightfield::from_elevations(vec![f64::NAN], bounds).is_err());
    }
}
