//! Stage-by-stage terrain generation.

use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use terrain::prelude::*;
use terrain::{Result as TerrainResult, TerrainView};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DeformationSpec, GenerationConfig, PrecipitationSpec};
use crate::naming::random_map_name;
use crate::relief::ReliefGenerator;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Points,
    Relaxation,
    Mesh,
    Elevation,
    Deformation,
    Hydrology,
    Erosion,
    Smoothing,
    Snapshot,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Points => "points",
            Self::Relaxation => "relaxation",
            Self::Mesh => "mesh",
            Self::Elevation => "elevation",
            Self::Deformation => "deformation",
            Self::Hydrology => "hydrology",
            Self::Erosion => "erosion",
            Self::Smoothing => "smoothing",
            Self::Snapshot => "snapshot",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: TerrainError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> AtStage<T> for TerrainResult<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}

/// Timing and shape of a finished run.
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub generation_time_ms: u64,
    pub point_count: usize,
    pub edge_count: usize,
    pub erosion_rounds: usize,
    pub land_fraction: f64,
    pub elevation_range: Option<(f64, f64)>,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct GeneratedTerrain {
    pub name: String,
    pub points: PointField,
    pub mesh: MeshGraph,
    pub heights: Heightfield,
    pub erosion: Vec<RoundReport>,
    pub snapshot: Snapshot,
    pub metrics: PipelineMetrics,
}

impl GeneratedTerrain {
    /// Read-only view for renderers.
    pub fn view(&self) -> TerrainResult<TerrainView<'_>> {
        TerrainView::new(&self.points, &self.mesh, &self.heights)
    }

    /// Writes the snapshot into `store`, returning the file path.
    pub fn save(&self, store: &SnapshotStore) -> Result<PathBuf, PipelineError> {
        store.save(&self.snapshot).at(Stage::Snapshot)
    }
}

/// Runs a validated [`GenerationConfig`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: GenerationConfig,
}

impl Pipeline {
    pub fn new(config: GenerationConfig) -> Result<Self, PipelineError> {
        config.validate().at(Stage::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// RNG seeded from the config, or from entropy when no seed is set.
    pub fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Snapshot store rooted at the configured output directory.
    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.config.output_dir.clone())
    }

    pub fn run(&self, rng: &mut impl Rng) -> Result<GeneratedTerrain, PipelineError> {
        self.run_with(rng, |_| ControlFlow::Continue(()))
    }

    /// Runs every stage, passing each erosion round's report to `on_round`.
    ///
    /// Breaking from `on_round` skips the remaining erosion rounds; smoothing and
    /// the snapshot still run on the partially eroded terrain.
    pub fn run_with<F>(
        &self,
        rng: &mut impl Rng,
        on_round: F,
    ) -> Result<GeneratedTerrain, PipelineError>
    where
        F: FnMut(&RoundReport) -> ControlFlow<()>,
    {
        let start = Instant::now();
        let config = &self.config;
        let name = match &config.name {
            Some(name) => name.clone(),
            None => random_map_name(rng),
        };
        info!(%name, points = config.point_count, "Generating terrain");

        let mut points = PointField::new(config.width, config.height).at(Stage::Points)?;
        points.generate(config.point_count, rng);

        points
            .relax_and_rescale(config.relax_iterations)
            .at(Stage::Relaxation)?;
        info!(iterations = config.relax_iterations, "Relaxed point field");

        let mesh = MeshGraph::build(&points).at(Stage::Mesh)?;
        info!(points = mesh.len(), edges = mesh.edge_count(), "Built mesh");

        let initial = vec![config.bounds.clamp(config.initial_elevation); points.len()];
        let mut heights = Heightfield::from_elevations(initial, config.bounds)
            .at(Stage::Elevation)?
            .with_sea_level(config.sea_level);

        for spec in &config.deformations {
            apply_deformation(&mut heights, &points, spec, rng).at(Stage::Deformation)?;
        }
        info!(
            count = config.deformations.len(),
            land = heights.land_fraction(),
            "Applied deformations"
        );

        apply_precipitation(&mut heights, &points, &config.precipitation, rng)
            .at(Stage::Hydrology)?;

        let erosion = FlowSimulator::new(&points, &mesh)
            .and_then(|sim| {
                sim.run_with(
                    &mut heights,
                    config.erosion.rounds,
                    config.erosion.factor,
                    on_round,
                )
            })
            .at(Stage::Erosion)?;
        info!(rounds = erosion.len(), "Eroded terrain");

        if let Some(factor) = config.smoothing {
            heights
                .smooth(&points, &mesh, factor)
                .at(Stage::Smoothing)?;
            info!(factor, "Smoothed terrain");
        }

        let snapshot = Snapshot::capture(name.clone(), &points, &heights).at(Stage::Snapshot)?;

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let metrics = PipelineMetrics {
            generation_time_ms: elapsed_ms,
            point_count: points.len(),
            edge_count: mesh.edge_count(),
            erosion_rounds: erosion.len(),
            land_fraction: heights.land_fraction(),
            elevation_range: heights.elevation_range(),
        };
        info!(
            %name,
            ms = metrics.generation_time_ms,
            land = metrics.land_fraction,
            "Terrain complete"
        );

        Ok(GeneratedTerrain {
            name,
            points,
            mesh,
            heights,
            erosion,
            snapshot,
            metrics,
        })
    }
}

fn apply_deformation(
    heights: &mut Heightfield,
    points: &PointField,
    spec: &DeformationSpec,
    rng: &mut impl Rng,
) -> TerrainResult<()> {
    match *spec {
        DeformationSpec::FlatLocus {
            center: [x, y],
            radius,
            delta,
        } => {
            heights.apply_radial(points, Coord { x, y }, radius, delta)?;
        }
        DeformationSpec::BoundedQuad {
            center,
            z_min,
            z_max,
            a,
            b,
            c,
        } => {
            let center = match center {
                Some([x, y]) => Coord { x, y },
                None => Coord {
                    x: rng.gen_range(0.0..points.width()),
                    y: rng.gen_range(0.0..points.height()),
                },
            };
            heights.apply_quadratic(points, center, z_min, z_max, a, b, c)?;
        }
        DeformationSpec::Noise {
            base,
            scale,
            frequency,
            octaves,
            seed,
        } => {
            let relief = ReliefGenerator::new(seed.unwrap_or_else(|| rng.r#gen()))
                .with_base(base)
                .with_scale(scale)
                .with_frequency(frequency)
                .with_octaves(octaves);
            heights.add_elevation_field(&relief.sample(points))?;
            debug!(base, scale, frequency, octaves, "Applied noise relief");
        }
    }
    Ok(())
}

fn apply_precipitation(
    heights: &mut Heightfield,
    points: &PointField,
    spec: &PrecipitationSpec,
    rng: &mut impl Rng,
) -> TerrainResult<()> {
    match *spec {
        PrecipitationSpec::Uniform { amount } => heights.set_uniform_precipitation(amount),
        PrecipitationSpec::Normal { mean, std_dev } => {
            let normal = Normal::new(mean, std_dev)
                .map_err(|e| TerrainError::InvalidParameter(e.to_string()))?;
            let amounts = (0..heights.len())
                .map(|_| normal.sample(rng).max(0.0))
                .collect();
            heights.set_precipitation(amounts)
        }
        PrecipitationSpec::Noise {
            base,
            scale,
            frequency,
            octaves,
            seed,
        } => {
            let relief = ReliefGenerator::new(seed.unwrap_or_else(|| rng.r#gen()))
                .with_base(base)
                .with_scale(scale)
                .with_frequency(frequency)
                .with_octaves(octaves);
            let amounts = relief
                .sample(points)
                .into_iter()
                .map(|p| p.max(0.0))
                .collect();
            heights.set_precipitation(amounts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GenerationConfig {
        GenerationConfig {
            name: Some("test-map".to_string()),
            point_count: 120,
            relax_iterations: 2,
            seed: Some(99),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Relaxation.to_string(), "relaxation");
        let err = PipelineError {
            stage: Stage::Mesh,
            source: TerrainError::DegenerateGeometry("all points coincide".to_string()),
        };
        assert!(err.to_string().starts_with("mesh stage failed"));
    }

    #[test]
    fn test_invalid_config_fails_at_config_stage() {
        let mut config = small_config();
        config.width = 0.0;
        let err = Pipeline::new(config).unwrap_err();
        assert_eq!(err.stage, Stage::Config);
        assert!(matches!(err.source, TerrainError::InvalidParameter(_)));
    }

    #[test]
    fn test_normal_precipitation_is_non_negative() {
        let points = PointField::from_points(
            10.0,
            10.0,
            (0..50)
                .map(|i| Coord {
                    x: i as f64 * 0.2,
                    y: 0.0,
                })
                .collect(),
        )
        .unwrap();
        let mut heights = Heightfield::init(50, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let spec = PrecipitationSpec::Normal {
            mean: 0.0,
            std_dev: 1.0,
        };
        apply_precipitation(&mut heights, &points, &spec, &mut rng).unwrap();
        assert!(heights.precipitation().iter().all(|&p| p >= 0.0));
        assert!(heights.precipitation().iter().any(|&p| p > 0.0));
    }

    #[test]
    fn test_run_is_reproducible() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let a = pipeline.run(&mut pipeline.rng()).unwrap();
        let b = pipeline.run(&mut pipeline.rng()).unwrap();
        assert_eq!(a.snapshot, b.snapshot);
    }

    #[test]
    fn test_cancelled_erosion_still_produces_snapshot() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let result = pipeline
            .run_with(&mut pipeline.rng(), |report| {
                if report.round >= 1 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(result.erosion.len(), 2);
        assert_eq!(result.metrics.erosion_rounds, 2);
        assert_eq!(result.snapshot.points.len(), 124);
    }
}
