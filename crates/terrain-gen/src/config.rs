//! Configuration types for terrain generation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use terrain::{ElevationBounds, Result, TerrainError};

/// Complete description of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Map name and storage key. A place-like name is drawn when absent.
    pub name: Option<String>,

    /// Bounding rectangle width.
    pub width: f64,

    /// Bounding rectangle height.
    pub height: f64,

    /// Random points placed before the four corners.
    pub point_count: usize,

    /// Relax-and-rescale passes over the point field.
    pub relax_iterations: usize,

    /// Starting elevation of every point.
    pub initial_elevation: f64,

    /// Elevation clamp applied after every update.
    pub bounds: ElevationBounds,

    /// Points at or below this elevation are submerged.
    pub sea_level: f64,

    pub precipitation: PrecipitationSpec,

    /// Deformations, applied in order.
    pub deformations: Vec<DeformationSpec>,

    pub erosion: ErosionConfig,

    /// Final smoothing factor, skipped when absent.
    pub smoothing: Option<f64>,

    /// RNG seed for reproducible runs.
    pub seed: Option<u64>,

    /// Directory snapshots are written to.
    pub output_dir: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let mut deformations = vec![DeformationSpec::FlatLocus {
            center: [400.0, 250.0],
            radius: 200.0,
            delta: 500.0,
        }];
        deformations.extend((0..7).map(|_| DeformationSpec::random_quad()));

        Self {
            name: None,
            width: 800.0,
            height: 500.0,
            point_count: 2000,
            relax_iterations: 6,
            initial_elevation: -50.0,
            bounds: ElevationBounds::default(),
            sea_level: 0.0,
            precipitation: PrecipitationSpec::default(),
            deformations,
            erosion: ErosionConfig::default(),
            smoothing: Some(0.5),
            seed: None,
            output_dir: PathBuf::from("maps"),
        }
    }
}

impl GenerationConfig {
    /// Reads and validates a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v > 0.0 && v.is_finite();
        if !(positive(self.width) && positive(self.height)) {
            return invalid(format!(
                "dimensions must be positive, got {} x {}",
                self.width, self.height
            ));
        }
        self.bounds.validate()?;
        if !self.initial_elevation.is_finite() || !self.sea_level.is_finite() {
            return invalid("initial elevation and sea level must be finite");
        }
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return invalid("name must not be blank");
        }
        if let Some(factor) = self.smoothing
            && !factor.is_finite()
        {
            return invalid(format!("smoothing factor must be finite, got {factor}"));
        }

        self.precipitation.validate()?;
        self.erosion.validate()?;
        for (i, deformation) in self.deformations.iter().enumerate() {
            deformation
                .validate()
                .map_err(|e| TerrainError::InvalidParameter(format!("deformation {i}: {e}")))?;
        }
        Ok(())
    }
}

/// How precipitation is distributed over the points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrecipitationSpec {
    /// Same amount everywhere.
    Uniform { amount: f64 },
    /// Independent normal draws, clamped at zero.
    Normal { mean: f64, std_dev: f64 },
    /// Perlin relief, clamped at zero.
    Noise {
        base: f64,
        scale: f64,
        frequency: f64,
        octaves: u32,
        seed: Option<u32>,
    },
}

impl Default for PrecipitationSpec {
    fn default() -> Self {
        Self::Uniform { amount: 0.2 }
    }
}

impl PrecipitationSpec {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Uniform { amount } => {
                if !(amount >= 0.0 && amount.is_finite()) {
                    return invalid(format!(
                        "uniform precipitation must be non-negative, got {amount}"
                    ));
                }
                Ok(())
            }
            Self::Normal { mean, std_dev } => {
                if !(mean.is_finite() && std_dev >= 0.0 && std_dev.is_finite()) {
                    return invalid(format!(
                        "normal precipitation needs finite mean and std_dev >= 0, got {mean} / {std_dev}"
                    ));
                }
                Ok(())
            }
            Self::Noise {
                base,
                scale,
                frequency,
                octaves,
                ..
            } => validate_noise(base, scale, frequency, octaves),
        }
    }
}

/// One elevation deformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeformationSpec {
    /// Raise or lower everything within `radius` of `center` by `delta`.
    FlatLocus {
        center: [f64; 2],
        radius: f64,
        delta: f64,
    },
    /// Add `clamp(a·n² + b·n + c, z_min, z_max)` at distance `n` from `center`.
    /// A missing centre is drawn uniformly inside the rectangle.
    BoundedQuad {
        center: Option<[f64; 2]>,
        z_min: f64,
        z_max: f64,
        a: f64,
        b: f64,
        c: f64,
    },
    /// Add Perlin relief around `base`.
    Noise {
        base: f64,
        scale: f64,
        frequency: f64,
        octaves: u32,
        seed: Option<u32>,
    },
}

impl DeformationSpec {
    /// The randomly centred mound used by the default run.
    pub fn random_quad() -> Self {
        Self::BoundedQuad {
            center: None,
            z_min: 0.0,
            z_max: 6000.0,
            a: -0.05,
            b: 0.0,
            c: 800.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::FlatLocus {
                center,
                radius,
                delta,
            } => {
                if !(radius >= 0.0 && radius.is_finite()) || !delta.is_finite() || !finite(center) {
                    return invalid(format!(
                        "flat locus needs a finite centre, radius >= 0 and finite delta, got r={radius} dz={delta}"
                    ));
                }
                Ok(())
            }
            Self::BoundedQuad {
                center,
                z_min,
                z_max,
                a,
                b,
                c,
            } => {
                if !(z_min <= z_max) || ![a, b, c].iter().all(|k| k.is_finite()) {
                    return invalid(format!(
                        "bounded quad needs z_min <= z_max and finite coefficients, got [{z_min}, {z_max}]"
                    ));
                }
                if center.is_some_and(|c| !finite(c)) {
                    return invalid("bounded quad centre must be finite");
                }
                Ok(())
            }
            Self::Noise {
                base,
                scale,
                frequency,
                octaves,
                ..
            } => validate_noise(base, scale, frequency, octaves),
        }
    }
}

/// Erosion rounds and strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErosionConfig {
    pub rounds: usize,
    pub factor: f64,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            factor: 50.0,
        }
    }
}

impl ErosionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() {
            return invalid(format!("erosion factor must be finite, got {}", self.factor));
        }
        Ok(())
    }
}

fn validate_noise(base: f64, scale: f64, frequency: f64, octaves: u32) -> Result<()> {
    if !(base.is_finite() && scale.is_finite() && frequency > 0.0 && frequency.is_finite()) {
        return invalid(format!(
            "noise needs finite base/scale and positive frequency, got {base} / {scale} / {frequency}"
        ));
    }
    if octaves == 0 {
        return invalid("noise needs at least one octave");
    }
    Ok(())
}

fn finite([x, y]: [f64; 2]) -> bool {
    x.is_finite() && y.is_finite()
}

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(TerrainError::InvalidParameter(message.into()))
}
