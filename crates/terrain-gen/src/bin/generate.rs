//! Generates one terrain and writes its snapshot.
//!
//! Run with:
//! ```
//! cargo run -p terrain-gen --bin generate -- [config.json]
//! ```
//!
//! The config path may also come from `TERRAIN_CONFIG`. `TERRAIN_OUTPUT_DIR`
//! and `TERRAIN_SEED` override the corresponding config fields.

use anyhow::Context;
use terrain_gen::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TERRAIN_CONFIG").ok());

    let mut config = match &config_path {
        Some(path) => GenerationConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => GenerationConfig::default(),
    };

    if let Ok(dir) = std::env::var("TERRAIN_OUTPUT_DIR") {
        config.output_dir = dir.into();
    }
    if let Ok(seed) = std::env::var("TERRAIN_SEED") {
        config.seed = Some(
            seed.parse::<u64>()
                .with_context(|| format!("TERRAIN_SEED is not a number: {seed}"))?,
        );
    }

    let pipeline = Pipeline::new(config)?;
    let mut rng = pipeline.rng();
    let terrain = pipeline.run(&mut rng)?;

    let path = terrain
        .save(&pipeline.store())
        .context("Failed to save snapshot")?;

    // Summary output
    tracing::info!("Generation completed!");
    tracing::info!("  Name: {}", terrain.name);
    tracing::info!("  Points: {}", terrain.metrics.point_count);
    tracing::info!("  Edges: {}", terrain.metrics.edge_count);
    tracing::info!("  Erosion rounds: {}", terrain.metrics.erosion_rounds);
    tracing::info!("  Land fraction: {:.3}", terrain.metrics.land_fraction);
    if let Some((low, high)) = terrain.metrics.elevation_range {
        tracing::info!("  Elevation: {:.1} .. {:.1}", low, high);
    }
    tracing::info!("  Snapshot: {}", path.display());

    Ok(())
}
