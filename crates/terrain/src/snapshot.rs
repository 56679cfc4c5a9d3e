//! Whole-terrain snapshots: name, dimensions, points and elevations.
//!
//! Adjacency, precipitation and flow are not stored. Restoring a snapshot
//! rebuilds the mesh from the stored points.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, TerrainError};
use crate::heightfield::{ElevationBounds, Heightfield};
use crate::mesh::MeshGraph;
use crate::points::PointField;

/// Durable record of one terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub height: u32,
    pub width: u32,
    pub points: Vec<[f64; 2]>,
    pub elevations: Vec<f64>,
}

/// Terrain state rebuilt from a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct RestoredTerrain {
    pub points: PointField,
    pub mesh: MeshGraph,
    pub heights: Heightfield,
}

impl Snapshot {
    /// Records the current points and elevations under `name`.
    pub fn capture(
        name: impl Into<String>,
        points: &PointField,
        heights: &Heightfield,
    ) -> Result<Self> {
        TerrainError::check_sizes("heightfield", points.len(), heights.len())?;

        let snapshot = Self {
            name: name.into(),
            height: whole_dimension("height", points.height())?,
            width: whole_dimension("width", points.width())?,
            points: points.points().iter().map(|p| [p.x, p.y]).collect(),
            elevations: heights.elevations().to_vec(),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Parses and validates a snapshot from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| TerrainError::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.width == 0 || self.height == 0 {
            return Err(TerrainError::InvalidSnapshot(format!(
                "dimensions must be positive, got {} x {}",
                self.width, self.height
            )));
        }
        if self.points.is_empty() {
            return Err(TerrainError::InvalidSnapshot("no points".to_string()));
        }
        if self.points.len() != self.elevations.len() {
            return Err(TerrainError::InvalidSnapshot(format!(
                "{} points but {} elevations",
                self.points.len(),
                self.elevations.len()
            )));
        }
        if let Some(i) = self
            .points
            .iter()
            .position(|[x, y]| !(x.is_finite() && y.is_finite()))
        {
            return Err(TerrainError::InvalidSnapshot(format!(
                "point {i} has a non-finite coordinate"
            )));
        }
        if let Some(i) = self.elevations.iter().position(|z| !z.is_finite()) {
            return Err(TerrainError::InvalidSnapshot(format!(
                "elevation {i} is not finite"
            )));
        }
        Ok(())
    }

    /// Rebuilds points, mesh and heightfield. Elevations outside `bounds` are rejected.
    pub fn restore(&self, bounds: ElevationBounds, sea_level: f64) -> Result<RestoredTerrain> {
        self.validate()?;

        let coords = self.points.iter().map(|&[x, y]| Coord { x, y }).collect();
        let points = PointField::from_points(self.width as f64, self.height as f64, coords)
            .map_err(|e| TerrainError::InvalidSnapshot(e.to_string()))?;
        let heights = Heightfield::from_elevations(self.elevations.clone(), bounds)
            .map_err(|e| TerrainError::InvalidSnapshot(e.to_string()))?
            .with_sea_level(sea_level);
        let mesh = MeshGraph::build(&points)?;

        debug!(name = %self.name, points = points.len(), "Restored snapshot");
        Ok(RestoredTerrain {
            points,
            mesh,
            heights,
        })
    }
}

/// Directory of snapshots stored as `<name>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Writes `snapshot`, replacing any earlier snapshot of the same name.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        snapshot.validate()?;
        let path = self.path_for(&snapshot.name)?;
        fs::create_dir_all(&self.dir)?;

        let mut writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;

        info!(path = %path.display(), points = snapshot.points.len(), "Saved snapshot");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Snapshot> {
        let path = self.path_for(name)?;
        let json = fs::read_to_string(&path)?;
        let snapshot = Snapshot::from_json(&json)?;
        if snapshot.name != name {
            return Err(TerrainError::InvalidSnapshot(format!(
                "file {} holds snapshot '{}'",
                path.display(),
                snapshot.name
            )));
        }
        Ok(snapshot)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Names of stored snapshots, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(TerrainError::InvalidSnapshot(format!(
            "'{name}' is not a usable snapshot name"
        )));
    }
    Ok(())
}

fn whole_dimension(what: &str, value: f64) -> Result<u32> {
    if value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
        return Err(TerrainError::InvalidSnapshot(format!(
            "{what} {value} is not a positive whole number"
        )));
    }
    Ok(value as u32)
}
