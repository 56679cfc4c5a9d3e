use thiserror::Error;

pub type Result<T, E = TerrainError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Point index {index} out of range for {len} points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid mesh state: {0}")]
    InvalidMeshState(String),

    #[error("Uninitialized state: {0}")]
    UninitializedState(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TerrainError {
    /// Checks `index` against a collection of `len` entries.
    pub fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(TerrainError::IndexOutOfRange { index, len })
        }
    }

    /// Fails with [`TerrainError::UninitializedState`] unless both sizes agree.
    pub fn check_sizes(what: &str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(TerrainError::UninitializedState(format!(
                "{what} has {actual} entries, expected {expected}"
            )))
        }
    }
}
