//! Fluent builder for generation runs.

use std::path::PathBuf;

use rand::Rng;
use terrain::ElevationBounds;

use crate::config::{DeformationSpec, ErosionConfig, GenerationConfig, PrecipitationSpec};
use crate::pipeline::{GeneratedTerrain, Pipeline, PipelineError};

/// Builder for a terrain generation run.
///
/// # Example
///
/// ```rust,ignore
/// let terrain = TerrainBuilder::new()
///     .with_name("highlands")
///     .with_points(1000)
///     .with_deformations(Vec::new())
///     .with_flat_locus([400.0, 250.0], 200.0, 500.0)
///     .with_random_quads(5)
///     .with_erosion(3, 40.0)
///     .with_seed(12345)
///     .build_seeded()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TerrainBuilder {
    config: GenerationConfig,
}

impl TerrainBuilder {
    /// Creates a builder with the default reference run.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: GenerationConfig) -> Self {
        Self { config }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Sets the number of random points placed before the corners.
    pub fn with_points(mut self, count: usize) -> Self {
        self.config.point_count = count;
        self
    }

    pub fn with_relax_iterations(mut self, iterations: usize) -> Self {
        self.config.relax_iterations = iterations;
        self
    }

    pub fn with_initial_elevation(mut self, elevation: f64) -> Self {
        self.config.initial_elevation = elevation;
        self
    }

    pub fn with_bounds(mut self, floor: f64, ceiling: f64) -> Self {
        self.config.bounds = ElevationBounds { floor, ceiling };
        self
    }

    pub fn with_sea_level(mut self, sea_level: f64) -> Self {
        self.config.sea_level = sea_level;
        self
    }

    pub fn with_precipitation(mut self, precipitation: PrecipitationSpec) -> Self {
        self.config.precipitation = precipitation;
        self
    }

    /// Replaces the whole deformation list.
    pub fn with_deformations(mut self, deformations: Vec<DeformationSpec>) -> Self {
        self.config.deformations = deformations;
        self
    }

    /// Appends one deformation.
    pub fn with_deformation(mut self, deformation: DeformationSpec) -> Self {
        self.config.deformations.push(deformation);
        self
    }

    pub fn with_flat_locus(self, center: [f64; 2], radius: f64, delta: f64) -> Self {
        self.with_deformation(DeformationSpec::FlatLocus {
            center,
            radius,
            delta,
        })
    }

    /// Appends `count` randomly centred mounds.
    pub fn with_random_quads(mut self, count: usize) -> Self {
        self.config
            .deformations
            .extend((0..count).map(|_| DeformationSpec::random_quad()));
        self
    }

    pub fn with_erosion(mut self, rounds: usize, factor: f64) -> Self {
        self.config.erosion = ErosionConfig { rounds, factor };
        self
    }

    /// Sets the final smoothing factor; `None` skips smoothing.
    pub fn with_smoothing(mut self, factor: Option<f64>) -> Self {
        self.config.smoothing = factor;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Validates the configuration into a runnable pipeline.
    pub fn pipeline(self) -> Result<Pipeline, PipelineError> {
        Pipeline::new(self.config)
    }

    /// Runs the pipeline with the caller's RNG.
    pub fn build(self, rng: &mut impl Rng) -> Result<GeneratedTerrain, PipelineError> {
        self.pipeline()?.run(rng)
    }

    /// Runs the pipeline with an RNG derived from the configured seed.
    pub fn build_seeded(self) -> Result<GeneratedTerrain, PipelineError> {
        let pipeline = self.pipeline()?;
        pipeline.run(&mut pipeline.rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small() -> TerrainBuilder {
        TerrainBuilder::new()
            .with_name("builder-test")
            .with_points(80)
            .with_relax_iterations(2)
    }

    #[test]
    fn test_builder_sets_fields() {
        let builder = TerrainBuilder::new()
            .with_dimensions(400.0, 300.0)
            .with_deformations(Vec::new())
            .with_flat_locus([200.0, 150.0], 100.0, 250.0)
            .with_random_quads(2)
            .with_erosion(3, 10.0)
            .with_smoothing(None)
            .with_seed(5);

        let config = builder.config();
        assert_eq!(config.width, 400.0);
        assert_eq!(config.deformations.len(), 3);
        assert_eq!(config.erosion, ErosionConfig { rounds: 3, factor: 10.0 });
        assert_eq!(config.smoothing, None);
        assert_eq!(config.seed, Some(5));
    }

    #[test]
    fn test_build_end_to_end() {
        let mut rng = StdRng::seed_from_u64(2024);
        let result = small().build(&mut rng).unwrap();

        assert_eq!(result.name, "builder-test");
        assert_eq!(result.points.len(), 84);
        assert_eq!(result.erosion.len(), 5);
        assert_eq!(result.snapshot.width, 800);
        assert_eq!(result.snapshot.height, 500);

        let bounds = result.heights.bounds();
        assert!(result.heights.elevations().iter().all(|&z| bounds.contains(z)));
        assert!(result.view().is_ok());
    }

    #[test]
    fn test_build_with_noise_and_saving() {
        let dir = tempfile::tempdir().unwrap();
        let result = small()
            .with_deformation(DeformationSpec::Noise {
                base: 0.0,
                scale: 200.0,
                frequency: 0.01,
                octaves: 3,
                seed: Some(4),
            })
            .with_precipitation(PrecipitationSpec::Noise {
                base: 0.2,
                scale: 0.1,
                frequency: 0.005,
                octaves: 2,
                seed: Some(4),
            })
            .with_output_dir(dir.path())
            .with_seed(11)
            .build_seeded()
            .unwrap();

        let store = terrain::SnapshotStore::new(dir.path());
        let path = result.save(&store).unwrap();
        assert!(path.is_file());
        assert_eq!(store.load("builder-test").unwrap(), result.snapshot);
    }

    #[test]
    fn test_random_name_when_unnamed() {
        let mut config = small().config().clone();
        config.name = None;
        let result = TerrainBuilder::from_config(config)
            .with_seed(8)
            .build_seeded()
            .unwrap();
        assert!(!result.name.is_empty());
        assert_eq!(result.snapshot.name, result.name);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let err = small().with_bounds(100.0, -100.0).pipeline().unwrap_err();
        assert_eq!(err.stage, Stage::Config);
    }
}
