//! Downhill flow routing and flow-driven erosion.
//!
//! Each point drains to its lowest neighbor when that neighbor is strictly
//! lower; otherwise it is a basin. Because every routing step strictly
//! decreases elevation, a drainage path visits each point at most once.
//!
//! An erosion round accumulates flow, derives flow velocity, then adjusts
//! elevations as one batch: all deltas are computed against the elevations at
//! the start of the round before any are applied.

use std::ops::ControlFlow;

use tracing::{debug, info};

use crate::errors::{Result, TerrainError};
use crate::heightfield::Heightfield;
use crate::mesh::MeshGraph;
use crate::points::PointField;

/// Summary of one completed erosion round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundReport {
    /// Zero-based index of the round.
    pub round: usize,
    /// Largest accumulated flow at any point.
    pub max_flow: f64,
    /// Points without a downhill neighbor.
    pub basins: usize,
    /// Mean absolute elevation change applied in this round.
    pub mean_change: f64,
}

/// Routes water over a [`MeshGraph`] and erodes a [`Heightfield`].
///
/// The simulator borrows the point field its mesh was built from, so the
/// points cannot move while it is in use.
#[derive(Debug, Clone, Copy)]
pub struct FlowSimulator<'a> {
    points: &'a PointField,
    mesh: &'a MeshGraph,
}

impl<'a> FlowSimulator<'a> {
    /// Fails with `InvalidMeshState` unless `mesh` was built from the current `points`.
    pub fn new(points: &'a PointField, mesh: &'a MeshGraph) -> Result<Self> {
        mesh.ensure_current(points)?;
        Ok(Self { points, mesh })
    }

    pub fn points(&self) -> &'a PointField {
        self.points
    }

    /// The neighbor with the lowest elevation, if it is strictly lower than `index`.
    ///
    /// Ties go to the first neighbor in adjacency order.
    pub fn min_neighbor(&self, field: &Heightfield, index: usize) -> Result<Option<usize>> {
        self.check(field)?;
        let own = field.elevation(index)?;
        Ok(self
            .lowest_neighbor(field, index)?
            .filter(|&j| field.elevation[j] < own))
    }

    /// The neighbor with the lowest elevation, whether or not it is below `index`.
    pub fn lowest_neighbor(&self, field: &Heightfield, index: usize) -> Result<Option<usize>> {
        self.check(field)?;
        let neighbors = self.mesh.neighbors(index)?;

        let mut best: Option<usize> = None;
        for &j in neighbors {
            match best {
                Some(b) if field.elevation[j] >= field.elevation[b] => {}
                _ => best = Some(j),
            }
        }
        Ok(best)
    }

    /// Routes every point's precipitation downhill, summing it into `flow`.
    ///
    /// A path stops at a basin or at the first point at or below sea level.
    pub fn accumulate_flow(&self, field: &mut Heightfield) -> Result<()> {
        self.check(field)?;
        let downhill = self.downhill_map(field)?;
        let n = field.len();

        let mut flow = vec![0.0; n];
        for (start, &amount) in field.precipitation.iter().enumerate() {
            let mut current = start;
            flow[current] += amount;

            let mut steps = 0;
            while field.elevation[current] > field.sea_level() {
                let Some(next) = downhill[current] else {
                    break;
                };
                steps += 1;
                if steps > n {
                    return Err(TerrainError::InvalidMeshState(format!(
                        "drainage path from point {start} did not terminate"
                    )));
                }
                current = next;
                flow[current] += amount;
            }
        }

        field.flow = flow;
        Ok(())
    }

    /// Sets each point's flow velocity to the elevation drop to its downhill
    /// neighbor, or zero for a basin.
    pub fn compute_flow_velocity(&self, field: &mut Heightfield) -> Result<()> {
        self.check(field)?;
        let downhill = self.downhill_map(field)?;

        field.flow_velocity = downhill
            .iter()
            .enumerate()
            .map(|(i, d)| d.map_or(0.0, |j| field.elevation[i] - field.elevation[j]))
            .collect();
        Ok(())
    }

    /// Deposits at basins and erodes along drainage, one batch over all points.
    ///
    /// Basins rise by `flow × factor` but no higher than their lowest neighbor;
    /// draining points sink by `flow × factor` but no lower than their downhill
    /// neighbor. Submerged points are left alone.
    pub fn erode(&self, field: &mut Heightfield, factor: f64) -> Result<()> {
        check_factor(factor)?;
        self.erode_batch(field, factor).map(|_| ())
    }

    /// Runs `rounds` complete erosion rounds.
    pub fn run(
        &self,
        field: &mut Heightfield,
        rounds: usize,
        factor: f64,
    ) -> Result<Vec<RoundReport>> {
        self.run_with(field, rounds, factor, |_| ControlFlow::Continue(()))
    }

    /// Runs up to `rounds` erosion rounds, consulting `after_round` between rounds.
    ///
    /// Returning [`ControlFlow::Break`] stops before the next round starts; the
    /// rounds already run stay applied.
    pub fn run_with<F>(
        &self,
        field: &mut Heightfield,
        rounds: usize,
        factor: f64,
        mut after_round: F,
    ) -> Result<Vec<RoundReport>>
    where
        F: FnMut(&RoundReport) -> ControlFlow<()>,
    {
        check_factor(factor)?;

        let mut reports = Vec::with_capacity(rounds);
        for round in 0..rounds {
            self.accumulate_flow(field)?;
            self.compute_flow_velocity(field)?;
            let mean_change = self.erode_batch(field, factor)?;

            let report = RoundReport {
                round,
                max_flow: field.flow.iter().copied().fold(0.0, f64::max),
                basins: field.flow_velocity.iter().filter(|&&v| v == 0.0).count(),
                mean_change,
            };
            debug!(?report, "Erosion round complete");
            reports.push(report);

            if after_round(&report).is_break() {
                info!(completed = round + 1, requested = rounds, "Erosion stopped early");
                break;
            }
        }
        Ok(reports)
    }

    /// Applies one erosion step and returns the mean absolute change.
    fn erode_batch(&self, field: &mut Heightfield, factor: f64) -> Result<f64> {
        self.check(field)?;
        let active: Vec<bool> = field.submerged_mask().iter().map(|s| !s).collect();

        let mut deltas = Vec::with_capacity(field.len());
        for i in 0..field.len() {
            let own = field.elevation[i];
            let flow = field.flow[i];
            let Some(target) = self.lowest_neighbor(field, i)? else {
                return Err(TerrainError::InvalidMeshState(format!(
                    "point {i} has no neighbors to erode toward"
                )));
            };
            let dz_to_neighbor = field.elevation[target] - own;

            let dz = if field.flow_velocity[i] == 0.0 {
                (flow * factor).min(dz_to_neighbor)
            } else {
                (-flow * factor).max(dz_to_neighbor)
            };
            deltas.push(dz);
        }

        let before = field.elevation.clone();
        field.apply_masked(&deltas, &active);

        let total: f64 = before
            .iter()
            .zip(&field.elevation)
            .map(|(a, b)| (a - b).abs())
            .sum();
        Ok(total / field.len().max(1) as f64)
    }

    /// Downhill neighbor of every point.
    fn downhill_map(&self, field: &Heightfield) -> Result<Vec<Option<usize>>> {
        (0..field.len())
            .map(|i| self.min_neighbor(field, i))
            .collect()
    }

    fn check(&self, field: &Heightfield) -> Result<()> {
        if field.is_empty() {
            return Err(TerrainError::UninitializedState(
                "heightfield has no points".to_string(),
            ));
        }
        TerrainError::check_sizes("heightfield", self.mesh.len(), field.len())
    }
}

fn check_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() {
        return Err(TerrainError::InvalidParameter(format!(
            "erosion factor must be finite, got {factor}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::ElevationBounds;
    use geo::Coord;

    fn points(n: usize) -> PointField {
        PointField::from_points(
            100.0,
            100.0,
            (0..n)
                .map(|i| Coord {
                    x: i as f64 * 10.0,
                    y: 0.0,
                })
                .collect(),
        )
        .unwrap()
    }

    /// A path graph 0 - 1 - ... - (n-1).
    fn chain(n: usize) -> (PointField, MeshGraph) {
        let pts = points(n);
        let adjacency = (0..n)
            .map(|i| {
                let mut list = Vec::new();
                if i > 0 {
                    list.push(i - 1);
                }
                if i + 1 < n {
                    list.push(i + 1);
                }
                list
            })
            .collect();
        let mesh = MeshGraph::from_adjacency(&pts, adjacency).unwrap();
        (pts, mesh)
    }

    fn field(elevations: Vec<f64>, precipitation: f64) -> Heightfield {
        let mut field = Heightfield::from_elevations(elevations, ElevationBounds::default())
            .unwrap()
            .with_sea_level(0.0);
        field.set_uniform_precipitation(precipitation).unwrap();
        field
    }

    #[test]
    fn test_two_point_scenario() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![100.0, 50.0], 1.0);

        assert_eq!(sim.min_neighbor(&heights, 0).unwrap(), Some(1));
        assert_eq!(sim.min_neighbor(&heights, 1).unwrap(), None);

        sim.accumulate_flow(&mut heights).unwrap();
        assert_eq!(heights.flows(), &[1.0, 2.0]);
    }

    #[test]
    fn test_min_neighbor_tie_takes_first() {
        let pts = points(3);
        let mesh = MeshGraph::from_adjacency(&pts, vec![vec![1, 2], vec![0], vec![0]]).unwrap();
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let heights = field(vec![10.0, 5.0, 5.0], 0.0);
        assert_eq!(sim.min_neighbor(&heights, 0).unwrap(), Some(1));
    }

    #[test]
    fn test_equal_neighbor_is_not_downhill() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let heights = field(vec![10.0, 10.0], 0.0);
        assert_eq!(sim.min_neighbor(&heights, 0).unwrap(), None);
        assert_eq!(sim.lowest_neighbor(&heights, 0).unwrap(), Some(1));
    }

    #[test]
    fn test_flow_stops_at_sea() {
        let (pts, mesh) = chain(4);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        // 30 -> 20 -> -5 (sea) -> -10
        let mut heights = field(vec![30.0, 20.0, -5.0, -10.0], 1.0);
        sim.accumulate_flow(&mut heights).unwrap();
        assert_eq!(heights.flows(), &[1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_flow_accumulates_along_slope() {
        let (pts, mesh) = chain(5);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![50.0, 40.0, 30.0, 20.0, 10.0], 0.5);
        sim.accumulate_flow(&mut heights).unwrap();
        assert_eq!(heights.flows(), &[0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_flow_is_recomputed_not_accumulated_twice() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![100.0, 50.0], 1.0);
        sim.accumulate_flow(&mut heights).unwrap();
        sim.accumulate_flow(&mut heights).unwrap();
        assert_eq!(heights.flows(), &[1.0, 2.0]);
    }

    #[test]
    fn test_flow_velocity() {
        let (pts, mesh) = chain(3);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![30.0, 10.0, 25.0], 0.0);
        sim.compute_flow_velocity(&mut heights).unwrap();
        assert_eq!(heights.flow_velocities(), &[20.0, 0.0, 15.0]);
    }

    #[test]
    fn test_erode_limits() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![100.0, 50.0], 1.0);
        sim.accumulate_flow(&mut heights).unwrap();
        sim.compute_flow_velocity(&mut heights).unwrap();

        sim.erode(&mut heights, 10.0).unwrap();
        // A erodes by flow 1 × 10; B deposits 2 × 10, both within their limits.
        assert_eq!(heights.elevations(), &[90.0, 70.0]);
    }

    #[test]
    fn test_erode_never_overshoots_neighbor() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![100.0, 50.0], 1.0);
        sim.accumulate_flow(&mut heights).unwrap();
        sim.compute_flow_velocity(&mut heights).unwrap();

        sim.erode(&mut heights, 1000.0).unwrap();
        // A stops at B's old elevation; B fills up to A's old elevation.
        assert_eq!(heights.elevations(), &[50.0, 100.0]);
    }

    #[test]
    fn test_erode_skips_submerged() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![100.0, -20.0], 1.0);
        sim.accumulate_flow(&mut heights).unwrap();
        sim.compute_flow_velocity(&mut heights).unwrap();
        sim.erode(&mut heights, 5.0).unwrap();
        assert_eq!(heights.elevations(), &[95.0, -20.0]);
    }

    #[test]
    fn test_erode_stays_within_bounds() {
        let (pts, mesh) = chain(3);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let bounds = ElevationBounds::new(9.5, 12.0).unwrap();
        let mut heights = Heightfield::from_elevations(vec![12.0, 9.5, 11.0], bounds).unwrap();
        heights.set_uniform_precipitation(1.0).unwrap();

        sim.run(&mut heights, 4, 100.0).unwrap();
        assert!(heights.elevations().iter().all(|&z| bounds.contains(z)));
    }

    #[test]
    fn test_size_mismatch() {
        let (pts, mesh) = chain(3);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![1.0, 2.0], 0.0);
        assert!(matches!(
            sim.accumulate_flow(&mut heights),
            Err(TerrainError::UninitializedState(_))
        ));

        let mut empty = Heightfield::init(0, 0.0);
        assert!(matches!(
            sim.accumulate_flow(&mut empty),
            Err(TerrainError::UninitializedState(_))
        ));
    }

    #[test]
    fn test_min_neighbor_out_of_range() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let heights = field(vec![1.0, 2.0], 0.0);
        assert!(matches!(
            sim.min_neighbor(&heights, 2),
            Err(TerrainError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_run_with_cancellation() {
        let (pts, mesh) = chain(5);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![50.0, 40.0, 30.0, 20.0, 10.0], 0.2);

        let reports = sim
            .run_with(&mut heights, 10, 1.0, |report| {
                if report.round == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].round, 0);
        assert_eq!(reports[0].basins, 1);
        assert!((reports[0].max_flow - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_run_rejects_nan_factor() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![1.0, 2.0], 0.0);
        assert!(sim.run(&mut heights, 1, f64::NAN).is_err());
    }

    #[test]
    fn test_erode_rejects_non_finite_factor() {
        let (pts, mesh) = chain(2);
        let sim = FlowSimulator::new(&pts, &mesh).unwrap();
        let mut heights = field(vec![100.0, 50.0], 1.0);
        sim.accumulate_flow(&mut heights).unwrap();
        sim.compute_flow_velocity(&mut heights).unwrap();

        for factor in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                sim.erode(&mut heights, factor),
                Err(TerrainError::InvalidParameter(_))
            ));
        }
        assert_eq!(heights.elevations(), &[100.0, 50.0]);
    }

    #[test]
    fn test_new_rejects_stale_mesh() {
        let (_, mesh) = chain(3);
        let other = points(3);
        assert!(matches!(
            FlowSimulator::new(&other, &mesh),
            Err(TerrainError::InvalidMeshState(_))
        ));
    }
}
